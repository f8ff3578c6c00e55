//! Heading-bounded chunking for oversized documents.
//!
//! Bodies at or below the line threshold produce no chunks. Above it, the
//! body is split at markdown headings; every line of the body lands in
//! exactly one chunk and chunk indices are contiguous from zero. Each chunk
//! carries the path of its heading ancestors, e.g. `"## Design > ### Locking"`.

/// One chunk of a large document body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSlice {
    pub header_path: String,
    pub text: String,
}

/// Split a body into heading-bounded chunks when it exceeds the threshold
pub fn chunk_by_headings(body: &str, threshold_lines: usize) -> Vec<ChunkSlice> {
    let lines: Vec<&str> = body.lines().collect();
    if lines.len() <= threshold_lines {
        return Vec::new();
    }

    // Heading stack of (level, heading line); headers at a level pop deeper ones
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut chunks: Vec<ChunkSlice> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_path = String::new();
    let mut in_fence = false;

    let flush = |chunks: &mut Vec<ChunkSlice>, current: &mut Vec<&str>, path: &str| {
        if current.iter().any(|l| !l.trim().is_empty()) {
            chunks.push(ChunkSlice {
                header_path: path.to_string(),
                text: current.join("\n"),
            });
        }
        current.clear();
    };

    for line in lines {
        let fence = line.trim_start().starts_with("```") || line.trim_start().starts_with("~~~");
        if fence {
            in_fence = !in_fence;
        }

        if !in_fence && !fence
            && let Some(level) = heading_level(line)
        {
            flush(&mut chunks, &mut current, &current_path);
            while stack.last().is_some_and(|(l, _)| *l >= level) {
                stack.pop();
            }
            stack.push((level, line.trim().to_string()));
            current_path = stack
                .iter()
                .map(|(_, h)| h.as_str())
                .collect::<Vec<_>>()
                .join(" > ");
        }

        current.push(line);
    }
    flush(&mut chunks, &mut current, &current_path);

    chunks
}

fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) && trimmed.chars().nth(hashes).is_some_and(|c| c == ' ') {
        Some(hashes)
    } else {
        None
    }
}

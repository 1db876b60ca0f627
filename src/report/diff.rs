//! Line diff between two canonical forms.
//!
//! Classic LCS table over the lines left after trimming the common prefix
//! and suffix. When that table would exceed the configured cell budget the
//! diff degrades to reporting the first diverging line.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Same,
    Removed,
    Added,
}

#[derive(Debug, Clone, Copy)]
struct Edit<'a> {
    op: Op,
    text: &'a str,
    /// Line index in the expected text where this edit applies.
    old: usize,
    /// Line index in the actual text where this edit applies.
    new: usize,
}

fn common_prefix(a: &[&str], b: &[&str]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[&str], b: &[&str]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn lcs_ops(a: &[&str], b: &[&str]) -> Vec<Op> {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    // table[i * width + j] = LCS length of a[i..] and b[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(Op::Same);
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            ops.push(Op::Removed);
            i += 1;
        } else {
            ops.push(Op::Added);
            j += 1;
        }
    }
    ops.extend(std::iter::repeat(Op::Removed).take(n - i));
    ops.extend(std::iter::repeat(Op::Added).take(m - j));
    ops
}

fn edits<'a>(a: &[&'a str], b: &[&'a str], ops: impl IntoIterator<Item = Op>) -> Vec<Edit<'a>> {
    let (mut old, mut new) = (0, 0);
    let mut out = Vec::new();
    for op in ops {
        let text = match op {
            Op::Same | Op::Removed => a[old],
            Op::Added => b[new],
        };
        out.push(Edit { op, text, old, new });
        match op {
            Op::Same => {
                old += 1;
                new += 1;
            }
            Op::Removed => old += 1,
            Op::Added => new += 1,
        }
    }
    out
}

fn render_hunks(edits: &[Edit<'_>], context: usize) -> Vec<String> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (pos, _) in edits.iter().enumerate().filter(|(_, e)| e.op != Op::Same) {
        let start = pos.saturating_sub(context);
        let end = (pos + context + 1).min(edits.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }

    let mut lines = Vec::new();
    for (start, end) in ranges {
        let hunk = &edits[start..end];
        let old_count = hunk.iter().filter(|e| e.op != Op::Added).count();
        let new_count = hunk.iter().filter(|e| e.op != Op::Removed).count();
        lines.push(format!(
            "@@ -{},{} +{},{} @@",
            hunk[0].old + 1,
            old_count,
            hunk[0].new + 1,
            new_count
        ));
        for edit in hunk {
            let marker = match edit.op {
                Op::Same => ' ',
                Op::Removed => '-',
                Op::Added => '+',
            };
            lines.push(format!("{}{}", marker, edit.text));
        }
    }
    lines
}

/// Unified-style diff of `expected` against `actual`, without file headers.
///
/// Returns no lines when the texts are equal.
pub fn unified_diff(expected: &str, actual: &str, context: usize, max_cells: usize) -> Vec<String> {
    let a: Vec<&str> = expected.split('\n').collect();
    let b: Vec<&str> = actual.split('\n').collect();

    let prefix = common_prefix(&a, &b);
    if prefix == a.len() && prefix == b.len() {
        return Vec::new();
    }
    let suffix = common_suffix(&a[prefix..], &b[prefix..]);
    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];

    let cells = (mid_a.len() + 1).checked_mul(mid_b.len() + 1);
    if cells.map_or(true, |c| c > max_cells) {
        return first_divergence(&a, &b, prefix);
    }

    let ops = std::iter::repeat(Op::Same)
        .take(prefix)
        .chain(lcs_ops(mid_a, mid_b))
        .chain(std::iter::repeat(Op::Same).take(suffix));
    render_hunks(&edits(&a, &b, ops), context)
}

fn first_divergence(a: &[&str], b: &[&str], at: usize) -> Vec<String> {
    let line = |lines: &[&str]| match lines.get(at) {
        Some(text) => text.to_string(),
        None => "<end of text>".to_string(),
    };
    vec![
        format!(
            "too large for a line diff ({} vs {} lines); first difference at line {}:",
            a.len(),
            b.len(),
            at + 1
        ),
        format!("-{}", line(a)),
        format!("+{}", line(b)),
    ]
}

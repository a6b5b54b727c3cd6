//! Fallback avatar generation.
//!
//! When a resolution reaches `Failed`, consumers render a generated avatar
//! instead of an image. Generation is a pure function of the label: the same
//! label always yields the same color and initials, so fallbacks are stable
//! across sessions without any persistence.

/// Background palette; a label hashes into a fixed slot.
const PALETTE: [&str; 10] = [
    "#1abc9c", "#2ecc71", "#3498db", "#9b59b6", "#34495e", "#16a085", "#27ae60", "#2980b9",
    "#8e44ad", "#e67e22",
];

/// The fixed mark used for system-owned labels.
const SYSTEM_MARK: &str = "SYS";

/// Renders a self-contained SVG avatar for `label`.
///
/// The markup embeds everything it needs; displaying it requires no further
/// network fetch.
pub fn generate(label: &str, size_px: u32) -> String {
    let color = PALETTE[fold_hash(label) as usize % PALETTE.len()];
    let initials = escape_text(&initials(label));
    let font_size = (size_px * 2) / 5;

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{size_px}" height="{size_px}" viewBox="0 0 {size_px} {size_px}"><rect width="{size_px}" height="{size_px}" fill="{color}"/><text x="50%" y="50%" dy=".1em" dominant-baseline="middle" text-anchor="middle" font-family="sans-serif" font-weight="600" font-size="{font_size}" fill="#ffffff">{initials}</text></svg>"##
    )
}

/// Deterministic fold hash over the label bytes.
fn fold_hash(label: &str) -> u32 {
    label
        .bytes()
        .fold(0u32, |hash, byte| hash.wrapping_mul(31).wrapping_add(byte as u32))
}

/// Picks 1-2 initials from the label.
///
/// First letter of the first and last whitespace-delimited token; the first
/// two characters when there is only one token. System labels get a fixed
/// three-letter mark.
fn initials(label: &str) -> String {
    if label.trim().eq_ignore_ascii_case("sistema") {
        return SYSTEM_MARK.to_owned();
    }

    let mut tokens = label.split_whitespace();
    let Some(first) = tokens.next() else {
        return "?".to_owned();
    };

    let initials: String = match tokens.last() {
        Some(last) => first.chars().take(1).chain(last.chars().take(1)).collect(),
        None => first.chars().take(2).collect(),
    };
    initials.to_uppercase()
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped
}

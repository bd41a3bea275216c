/// Pull the first JSON object out of an assistant message, tolerating
/// markdown fences and surrounding prose.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return Some(trimmed);
    }

    let fence = "```";
    if let Some(start) = raw.find(fence) {
        let after_fence = &raw[start + fence.len()..];
        let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
        if let Some(end) = after_lang.find(fence) {
            let block = after_lang[..end].trim();
            if block.starts_with('{') {
                return Some(block);
            }
        }
    }

    let open = raw.find('{')?;
    let mut depth = 0i32;
    for (idx, ch) in raw[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[open..=open + idx]);
                }
            }
            _ => {}
        }
    }
    None
}

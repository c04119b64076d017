//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// Literal JSON braces in prompt templates are left alone unless they spell a key.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// First `max_chars` characters of `s`, never splitting a UTF-8 sequence.
pub fn char_prefix(s: &str, max_chars: usize) -> &str {
  match s.char_indices().nth(max_chars) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge model replies.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  let head = char_prefix(s, max);
  if head.len() == s.len() { s.to_string() } else { format!("{}… ({} bytes total)", head, s.len()) }
}

/// Reduce a user-supplied file name to `[A-Za-z0-9._-]`, collapsing whitespace to `_`
/// and stripping leading dots so the result can never escape its directory.
pub fn sanitize_filename(name: &str) -> String {
  let base = name.rsplit(['/', '\\']).next().unwrap_or("");
  let cleaned: String = base
    .split_whitespace()
    .collect::<Vec<_>>()
    .join("_")
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    .collect();
  cleaned.trim_start_matches(['.', '_']).to_string()
}

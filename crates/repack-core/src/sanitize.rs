//! Text sanitisation for untrusted submission values.
//!
//! Remote plugins have always been validated against the same rules: markup
//! is stripped, percent-encoded octets are removed, control characters are
//! dropped and whitespace collapses to single spaces.

/// Sanitise a single-line text value.
///
/// A `<` that does not open a tag is kept as `&lt;`; everything that looks
/// like a tag is removed, along with the contents of `script` and `style`
/// elements.
pub fn sanitize_text_field(raw: &str) -> String {
  let filtered = if raw.contains('<') {
    strip_tags(raw, true)
  } else {
    raw.to_owned()
  };

  let filtered = collapse_whitespace(&remove_controls(&filtered));
  match remove_octets(&filtered) {
    Some(without) => collapse_whitespace(&without),
    None => filtered,
  }
}

/// Strip all markup and trim. Used for display titles.
pub fn strip_all_tags(raw: &str) -> String {
  collapse_whitespace(&strip_tags(raw, false))
}

fn strip_tags(raw: &str, escape_lone_lt: bool) -> String {
  let mut out = String::with_capacity(raw.len());
  let mut rest = raw;

  while let Some(pos) = rest.find('<') {
    out.push_str(&rest[..pos]);
    let after = &rest[pos + 1..];

    if !starts_tag(after) {
      out.push_str(if escape_lone_lt { "&lt;" } else { "<" });
      rest = after;
      continue;
    }

    let name = tag_name(after);
    rest = if name.eq_ignore_ascii_case("script")
      || name.eq_ignore_ascii_case("style")
    {
      skip_element(after, name)
    } else {
      match after.find('>') {
        Some(end) => &after[end + 1..],
        None => "",
      }
    };
  }

  out.push_str(rest);
  out
}

fn starts_tag(s: &str) -> bool {
  matches!(
    s.chars().next(),
    Some(c) if c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?')
  )
}

fn tag_name(s: &str) -> &str {
  let end = s
    .find(|c: char| !c.is_ascii_alphanumeric())
    .unwrap_or(s.len());
  &s[..end]
}

/// Skip past the closing tag of `name`, dropping the element's content.
fn skip_element<'a>(s: &'a str, name: &str) -> &'a str {
  // ASCII lowercasing keeps byte offsets identical.
  let lower = s.to_ascii_lowercase();
  let closing = format!("</{}", name.to_ascii_lowercase());
  let Some(start) = lower.find(&closing) else {
    return "";
  };
  match s[start..].find('>') {
    Some(end) => &s[start + end + 1..],
    None => "",
  }
}

fn remove_controls(s: &str) -> String {
  s.chars()
    .filter(|c| !c.is_control() || matches!(c, '\r' | '\n' | '\t'))
    .collect()
}

/// Collapse runs of spaces, tabs and line breaks into one space and trim.
fn collapse_whitespace(s: &str) -> String {
  s.split([' ', '\r', '\n', '\t'])
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Remove `%XX` octets until none remain. Returns `None` if there were none.
fn remove_octets(s: &str) -> Option<String> {
  let mut current = s.as_bytes().to_vec();
  let mut found = false;

  loop {
    let mut out = Vec::with_capacity(current.len());
    let mut removed = false;
    let mut i = 0;
    while i < current.len() {
      if current[i] == b'%'
        && i + 2 < current.len()
        && current[i + 1].is_ascii_hexdigit()
        && current[i + 2].is_ascii_hexdigit()
      {
        i += 3;
        removed = true;
        continue;
      }
      out.push(current[i]);
      i += 1;
    }
    current = out;
    if !removed {
      break;
    }
    found = true;
  }

  // Only ASCII triplets were removed, so the bytes are still valid UTF-8.
  found.then(|| String::from_utf8_lossy(&current).into_owned())
}

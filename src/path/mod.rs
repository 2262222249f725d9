//! gNMI path handling.
//!
//! Parses the xpath wire syntax into structured [`Path`] messages, renders
//! structured paths back into canonical xpath strings (used as registry and
//! event-matching keys), and composes request prefixes with paths.
//!
//! Path conventions follow
//! <https://github.com/openconfig/reference/blob/master/rpc/gnmi/gnmi-path-conventions.md>.

use std::collections::HashMap;

use crate::errors::PathError;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::PathElem;


/// Parses an xpath string into a gNMI [`Path`].
///
/// For example, `/interfaces/interface[name=Ethernet1/2/3]/state/counters`
/// is parsed to:
///
/// ```text
/// elem: <name: "interfaces">
/// elem: <name: "interface"  key: <key: "name" value: "Ethernet1/2/3">>
/// elem: <name: "state">
/// elem: <name: "counters">
/// ```
pub fn parse_xpath(xpath: &str) -> Result<Path, PathError> {
    let mut elems = Vec::new();
    for part in split_path(xpath)? {
        elems.push(parse_element(part)?);
    }
    Ok(Path {
        elem: elems,
        ..Default::default()
    })
}

/// Renders a [`Path`] as a canonical xpath string: keys in sorted order,
/// `[` and `]` inside key values escaped. The root path renders as `/`.
pub fn xpath(path: &Path) -> String {
    if path.elem.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for elem in &path.elem {
        out.push('/');
        out.push_str(&elem.name);
        let mut keys: Vec<_> = elem.key.iter().collect();
        keys.sort();
        for (k, v) in keys {
            out.push('[');
            out.push_str(k);
            out.push('=');
            out.push_str(&v.replace('[', "\\[").replace(']', "\\]"));
            out.push(']');
        }
    }
    out
}

/// Builds the full path from a request prefix and a path. The `origin` of
/// `path` is preserved; element sequences are concatenated.
pub fn full_path(prefix: Option<&Path>, path: &Path) -> Path {
    let mut full = Path {
        origin: path.origin.clone(),
        ..Default::default()
    };
    if let Some(prefix) = prefix {
        full.element.extend(prefix.element.iter().cloned());
        full.elem.extend(prefix.elem.iter().cloned());
    }
    full.element.extend(path.element.iter().cloned());
    full.elem.extend(path.elem.iter().cloned());
    full
}

/// True when a path is expressed only through the deprecated string-array
/// `element` form, which this target rejects with `Unimplemented`.
pub fn uses_legacy_elements(path: &Path) -> bool {
    path.elem.is_empty() && !path.element.is_empty()
}

/// Splits an xpath into element substrings. `/` separates elements except
/// inside an unescaped `[...]` region; a `]` preceded by `\` is literal; a
/// `[` without a closing `]` is an error.
///
/// `"/a/b[k=eth1/1]/c"` splits into `["a", "b[k=eth1/1]", "c"]`.
fn split_path(path: &str) -> Result<Vec<&str>, PathError> {
    let bytes = path.as_bytes();
    let mut parts = Vec::new();
    // inside_brackets is true between an unescaped '[' and the first
    // unescaped ']' after it.
    let mut inside_brackets = false;
    let mut begin = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'/' if !inside_brackets => {
                if i > begin {
                    parts.push(&path[begin..i]);
                }
                begin = i + 1;
            }
            b'[' if !inside_brackets && (i == 0 || bytes[i - 1] != b'\\') => {
                inside_brackets = true;
            }
            b']' if inside_brackets && (i == 0 || bytes[i - 1] != b'\\') => {
                inside_brackets = false;
            }
            _ => {}
        }
    }
    if inside_brackets {
        return Err(PathError::MissingCloseBracket {
            path: path.to_string(),
        });
    }
    if bytes.len() > begin {
        parts.push(&path[begin..]);
    }
    Ok(parts)
}

/// Parses one split element: either a plain schema node name, or
/// `list-name[k1=v1]...[kN=vN]`.
fn parse_element(elem: &str) -> Result<PathElem, PathError> {
    let Some(i) = elem.find('[') else {
        if !is_yang_identifier(elem) {
            return Err(PathError::InvalidNodeName {
                name: elem.to_string(),
            });
        }
        return Ok(PathElem {
            name: elem.to_string(),
            key: HashMap::new(),
        });
    };

    let name = &elem[..i];
    if !is_yang_identifier(name) {
        return Err(PathError::InvalidListName {
            name: name.to_string(),
            elem: elem.to_string(),
        });
    }
    let key = parse_key_values(&elem[i..], elem)?;
    Ok(PathElem {
        name: name.to_string(),
        key,
    })
}

/// Parses a `[k1=v1][k2=v2]...` run. Keys must be valid YANG identifiers,
/// values are non-empty strings in which `\]` and `\[` decode to `]` and
/// `[`. Any malformed pair fails, naming the fragment.
fn parse_key_values(pairs: &str, elem: &str) -> Result<HashMap<String, String>, PathError> {
    let bytes = pairs.as_bytes();
    let mut key_values = HashMap::new();
    let mut inside_brackets = false;
    let mut begin = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'[' if !inside_brackets && (i == 0 || bytes[i - 1] != b'\\') => {
                inside_brackets = true;
            }
            b']' if inside_brackets && bytes[i - 1] != b'\\' => {
                inside_brackets = false;
                let pair = &pairs[begin..=i];
                let (key, value) =
                    split_key_value(pair).ok_or_else(|| PathError::MalformedKeyValue {
                        pair: pair.to_string(),
                        elem: elem.to_string(),
                    })?;
                key_values.insert(key, value);
                begin = i + 1;
            }
            _ => {}
        }
    }
    if begin < bytes.len() {
        return Err(PathError::MalformedKeyValue {
            pair: pairs[begin..].to_string(),
            elem: elem.to_string(),
        });
    }
    Ok(key_values)
}

fn split_key_value(pair: &str) -> Option<(String, String)> {
    let inner = pair.strip_prefix('[')?.strip_suffix(']')?;
    let (key, value) = inner.split_once('=')?;
    if !is_yang_identifier(key) || value.is_empty() {
        return None;
    }
    // Recover escaped ']' and '['.
    Some((
        key.to_string(),
        value.replace("\\]", "]").replace("\\[", "["),
    ))
}

/// YANG identifiers must follow RFC 6020 §6.2:
/// `[A-Za-z_][A-Za-z0-9_\-.]*`.
fn is_yang_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

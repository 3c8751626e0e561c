//! Splitting multi-statement input at top-level semicolons.

/// Slice `source` into statements at top-level semicolons.
///
/// Semicolons inside strings, quoted identifiers, comments, or any level of
/// `()`, `[]`, `{}` nesting do not split. Each statement keeps its
/// terminating semicolon, and the trailing (possibly unterminated, possibly
/// empty) fragment is always the final element, so concatenating the result
/// reproduces the input exactly.
pub fn split_statements(source: &str) -> Vec<&str> {
    let bytes = source.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_string(bytes, i),
            b'`' => i = skip_delimited(bytes, i, b'`'),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i += 2;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b';' if depth == 0 => {
                statements.push(&source[start..=i]);
                start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    statements.push(&source[start..]);
    statements
}

/// Skip a quoted string starting at `i`, honoring backslash escapes.
fn skip_string(bytes: &[u8], i: usize) -> usize {
    let quote = bytes[i];
    let mut i = i + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            b'\n' => return i, // unterminated; the line ends the literal
            _ => i += 1,
        }
    }
    i.min(bytes.len())
}

/// Skip a delimited region with no escapes (backtick identifiers).
fn skip_delimited(bytes: &[u8], i: usize, close: u8) -> usize {
    let mut i = i + 1;
    while i < bytes.len() {
        if bytes[i] == close {
            return i + 1;
        }
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_top_level_semicolons() {
        assert_eq!(
            split_statements("a | count; b | take 1; c"),
            vec!["a | count;", " b | take 1;", " c"]
        );
    }

    #[test]
    fn no_semicolon_is_one_fragment() {
        assert_eq!(split_statements("a | count"), vec!["a | count"]);
    }

    #[test]
    fn trailing_fragment_may_be_empty() {
        assert_eq!(split_statements("a | count;"), vec!["a | count;", ""]);
    }

    #[test]
    fn semicolons_in_strings_do_not_split() {
        assert_eq!(
            split_statements("a | where x == 'a;b'; c"),
            vec!["a | where x == 'a;b';", " c"]
        );
        assert_eq!(
            split_statements(r#"a | where x == "it\";s"; c"#),
            vec![r#"a | where x == "it\";s";"#, " c"]
        );
    }

    #[test]
    fn semicolons_in_comments_do_not_split() {
        assert_eq!(
            split_statements("a // x;y\n| count; b"),
            vec!["a // x;y\n| count;", " b"]
        );
        assert_eq!(
            split_statements("a /* x;y */ | count; b"),
            vec!["a /* x;y */ | count;", " b"]
        );
    }

    #[test]
    fn semicolons_in_brackets_do_not_split() {
        assert_eq!(
            split_statements("a | join (b; c) on k; d"),
            vec!["a | join (b; c) on k;", " d"]
        );
        assert_eq!(split_statements("a | where [x;y]; b"), vec!["a | where [x;y];", " b"]);
    }

    #[test]
    fn unterminated_string_stops_at_end_of_line() {
        // The quote runs to the line end, so the later semicolon splits.
        assert_eq!(
            split_statements("a | where x == 'oops\nb | count; c"),
            vec!["a | where x == 'oops\nb | count;", " c"]
        );
    }

    #[test]
    fn concatenation_reproduces_the_input() {
        let inputs = [
            "",
            ";",
            ";;",
            "a | count; b | take 1; trailing",
            "a | where s == ';' // ;\n; b /* ; */;",
            "unbalanced (a; b",
        ];
        for input in inputs {
            let joined: String = split_statements(input).concat();
            assert_eq!(joined, input, "round trip failed for {input:?}");
        }
    }

    #[test]
    fn every_piece_is_a_slice_of_the_input() {
        let input = "a;b;c";
        assert_eq!(split_statements(input), vec!["a;", "b;", "c"]);
    }
}

//! CamelCase name expansion.

/// Expand a CamelCase event name into space-separated words.
///
/// A space is inserted before an uppercase letter when the previous character
/// is lowercase (`FileName` → `File Name`), or when the previous character is
/// an uppercase letter or digit and the next one is lowercase. The latter
/// splits an acronym or a digit run from the word that follows it
/// (`HTTPConnection` → `HTTP Connection`, `SHA256HashData` → `SHA256 Hash Data`).
///
/// Casing is never changed and existing separators are left alone, so a name
/// without any boundary comes back unchanged.
pub fn expand_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + chars.len() / 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && is_boundary(&chars, i) {
            out.push(' ');
        }
        out.push(c);
    }

    out
}

fn is_boundary(chars: &[char], i: usize) -> bool {
    let current = chars[i];
    if !current.is_uppercase() {
        return false;
    }

    let prev = chars[i - 1];
    if prev.is_lowercase() {
        return true;
    }

    let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
    (prev.is_uppercase() || prev.is_ascii_digit()) && next_is_lower
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_camel_case() {
        assert_eq!(expand_name("ProcessRollup"), "Process Rollup");
        assert_eq!(expand_name("TargetFileName"), "Target File Name");
        assert_eq!(expand_name("ProcessMemoryAllocation"), "Process Memory Allocation");
    }

    #[test]
    fn leading_acronym_with_digits() {
        assert_eq!(expand_name("SHA256HashData"), "SHA256 Hash Data");
        assert_eq!(expand_name("HTTPConnection"), "HTTP Connection");
        assert_eq!(expand_name("DnsRequest"), "Dns Request");
    }

    #[test]
    fn trailing_acronym() {
        assert_eq!(expand_name("ProcessID"), "Process ID");
        assert_eq!(expand_name("UserLogonSMB"), "User Logon SMB");
    }

    #[test]
    fn digit_run_before_word() {
        assert_eq!(expand_name("Ip4Address"), "Ip4 Address");
        assert_eq!(expand_name("ProcessRollup2"), "Process Rollup2");
    }

    #[test]
    fn single_word_and_lowercase_unchanged() {
        assert_eq!(expand_name("Status"), "Status");
        assert_eq!(expand_name("process"), "process");
        assert_eq!(expand_name("DNS"), "DNS");
        assert_eq!(expand_name(""), "");
    }

    #[test]
    fn existing_separators_pass_through() {
        assert_eq!(expand_name("Sys Config Info"), "Sys Config Info");
        assert_eq!(expand_name("File_Write"), "File_Write");
        assert_eq!(expand_name("Lfo-Download"), "Lfo-Download");
    }

    #[test]
    fn stable_on_already_expanded_names() {
        for name in ["SysConfigInfo", "SHA256HashData", "HTTPConnection"] {
            let once = expand_name(name);
            assert_eq!(expand_name(&once), once);
        }
    }
}

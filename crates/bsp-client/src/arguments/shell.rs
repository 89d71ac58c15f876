//! Tokenization of compilation-database `command` strings.
//!
//! `compile_commands.json` may carry the compiler invocation as a single string; splitting it
//! follows POSIX shell quoting on Unix-likes and the MSVC command-line rules on Windows.

/// Split using the rules of the host platform.
pub fn split_shell_command(command: &str) -> Vec<String> {
    if cfg!(windows) {
        split_windows_command(command)
    } else {
        split_posix_command(command)
    }
}

/// POSIX shell splitting: whitespace separates arguments, `'…'` is literal, `"…"` allows
/// backslash-escaping of the next character, and a backslash outside quotes escapes the next
/// character.
pub fn split_posix_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                for c in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    current.push(c);
                }
            }
            '"' => {
                in_token = true;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        c => current.push(c),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        args.push(current);
    }
    args
}

/// Windows command-line splitting per the MSVC rule: 2n backslashes before a quote emit n
/// backslashes and the quote toggles quoting; 2n+1 backslashes before a quote emit n
/// backslashes and a literal quote; backslashes elsewhere are literal. Inside the first
/// argument (the command name) backslashes are never escape characters.
pub fn split_windows_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = command.chars().peekable();

    skip_whitespace(&mut chars);
    if chars.peek().is_none() {
        return args;
    }

    // Command name: quotes toggle, backslashes are plain characters.
    let mut current = String::new();
    let mut in_quotes = false;
    while let Some(&c) = chars.peek() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                chars.next();
            }
            c if c.is_whitespace() && !in_quotes => break,
            c => {
                current.push(c);
                chars.next();
            }
        }
    }
    args.push(current);

    loop {
        skip_whitespace(&mut chars);
        if chars.peek().is_none() {
            break;
        }
        let mut current = String::new();
        let mut in_quotes = false;
        while let Some(&c) = chars.peek() {
            match c {
                '\\' => {
                    let mut backslashes = 0usize;
                    while chars.peek() == Some(&'\\') {
                        backslashes += 1;
                        chars.next();
                    }
                    if chars.peek() == Some(&'"') {
                        current.extend(std::iter::repeat('\\').take(backslashes / 2));
                        if backslashes % 2 == 1 {
                            current.push('"');
                            chars.next();
                        }
                    } else {
                        current.extend(std::iter::repeat('\\').take(backslashes));
                    }
                }
                '"' => {
                    in_quotes = !in_quotes;
                    chars.next();
                }
                c if c.is_whitespace() && !in_quotes => break,
                c => {
                    current.push(c);
                    chars.next();
                }
            }
        }
        args.push(current);
    }
    args
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
        chars.next();
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("clang -c a.c", &["clang", "-c", "a.c"]; "plain")]
    #[test_case("clang   -c\ta.c", &["clang", "-c", "a.c"]; "runs of whitespace")]
    #[test_case(r#"clang "-DVALUE=a b" a.c"#, &["clang", "-DVALUE=a b", "a.c"]; "double quotes")]
    #[test_case(r#"clang '-DVALUE="a"' a.c"#, &["clang", r#"-DVALUE="a""#, "a.c"]; "single quotes are literal")]
    #[test_case(r#"clang -DX=\" a.c"#, &["clang", r#"-DX=""#, "a.c"]; "backslash escapes outside quotes")]
    #[test_case(r#"clang "a\"b""#, &["clang", r#"a"b"#]; "backslash escapes inside double quotes")]
    #[test_case("clang ''", &["clang", ""]; "empty quoted argument survives")]
    #[test_case("", &[]; "empty input")]
    fn posix(command: &str, expected: &[&str]) {
        assert_eq!(split_posix_command(command), expected);
    }

    #[test_case(r#"cl.exe a b"#, &["cl.exe", "a", "b"]; "plain")]
    #[test_case(r#""C:\Program Files\cl.exe" a"#, &[r#"C:\Program Files\cl.exe"#, "a"]; "quoted command name keeps backslashes")]
    #[test_case(r#"cl.exe "a b" c"#, &["cl.exe", "a b", "c"]; "quoted argument")]
    #[test_case(r#"cl.exe a\\b"#, &[r#"cl.exe"#, r#"a\\b"#]; "backslashes not before quote are literal")]
    #[test_case(r#"cl.exe a\"b"#, &["cl.exe", r#"a"b"#]; "odd backslashes yield literal quote")]
    #[test_case(r#"cl.exe a\\"b c""#, &["cl.exe", r#"a\b c"#]; "even backslashes make quote a metacharacter")]
    #[test_case(r#"cl.exe a\\\"b"#, &["cl.exe", r#"a\"b"#]; "three backslashes")]
    fn windows(command: &str, expected: &[&str]) {
        assert_eq!(split_windows_command(command), expected);
    }
}

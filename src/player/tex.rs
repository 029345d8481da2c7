//! Light LaTeX → Unicode conversion for formula lines.
//!
//! Formulas are drawn as plain text, so common commands are replaced by the symbols they
//! typeset as, `\frac{a}{b}` becomes `a/b`, grouping braces disappear and short digit
//! super/subscripts turn into Unicode script characters. Unknown commands keep their name.

use std::iter::Peekable;
use std::str::Chars;

const SYMBOLS: &[(&str, &str)] = &[
    ("angle", "∠"),
    ("triangle", "△"),
    ("odot", "⊙"),
    ("circ", "°"),
    ("degree", "°"),
    ("cdot", "·"),
    ("times", "×"),
    ("div", "÷"),
    ("pm", "±"),
    ("mp", "∓"),
    ("le", "≤"),
    ("leq", "≤"),
    ("ge", "≥"),
    ("geq", "≥"),
    ("ne", "≠"),
    ("neq", "≠"),
    ("approx", "≈"),
    ("equiv", "≡"),
    ("cong", "≅"),
    ("sim", "∼"),
    ("parallel", "∥"),
    ("perp", "⊥"),
    ("therefore", "∴"),
    ("because", "∵"),
    ("infty", "∞"),
    ("in", "∈"),
    ("rightarrow", "→"),
    ("Rightarrow", "⇒"),
    ("leftarrow", "←"),
    ("Leftrightarrow", "⇔"),
    ("alpha", "α"),
    ("beta", "β"),
    ("gamma", "γ"),
    ("delta", "δ"),
    ("Delta", "Δ"),
    ("theta", "θ"),
    ("lambda", "λ"),
    ("mu", "μ"),
    ("pi", "π"),
    ("sigma", "σ"),
    ("phi", "φ"),
    ("omega", "ω"),
    ("quad", "  "),
    ("qquad", "    "),
    ("sin", "sin"),
    ("cos", "cos"),
    ("tan", "tan"),
];

/// Prefix operators that swallow the space after them (`\angle ABC` → `∠ABC`).
const PREFIX_OPERATORS: &[&str] = &["angle", "triangle", "odot"];

/// Commands whose single argument is emitted as ordinary text.
const TEXT_WRAPPERS: &[&str] = &[
    "text",
    "mathrm",
    "mathbf",
    "mathit",
    "textbf",
    "operatorname",
    "overline",
    "boxed",
];

/// Convert a LaTeX formula into displayable plain text.
pub fn tex_to_plain(src: &str) -> String {
    let mut out = String::new();
    convert_into(&mut src.chars().peekable(), &mut out);
    collapse_spaces(&out)
}

fn convert(src: &str) -> String {
    let mut out = String::new();
    convert_into(&mut src.chars().peekable(), &mut out);
    out
}

fn convert_into(it: &mut Peekable<Chars<'_>>, out: &mut String) {
    while let Some(c) = it.next() {
        match c {
            '\\' => command(it, out),
            '{' | '}' | '$' => {}
            '~' => out.push(' '),
            '^' => {
                let arg = convert(&read_arg(it));
                out.push_str(&script(&arg, superscript_char, '^'));
            }
            '_' => {
                let arg = convert(&read_arg(it));
                out.push_str(&script(&arg, subscript_char, '_'));
            }
            other => out.push(other),
        }
    }
}

fn command(it: &mut Peekable<Chars<'_>>, out: &mut String) {
    let name = read_command_name(it);
    match name.as_str() {
        "" => {}
        "\\" | "," | ";" | ":" | "!" | " " => out.push(' '),
        "{" | "}" | "%" | "$" | "#" | "&" | "_" => out.push_str(&name),
        "left" | "right" => {
            if it.peek() == Some(&'.') {
                it.next();
            }
        }
        "frac" | "dfrac" | "tfrac" => {
            let num = convert(&read_arg(it));
            let den = convert(&read_arg(it));
            out.push_str(&wrap_operand(&num));
            out.push('/');
            out.push_str(&wrap_operand(&den));
        }
        "sqrt" => {
            let index = read_optional_arg(it);
            let body = convert(&read_arg(it));
            if let Some(n) = index {
                out.push_str(&script(&convert(&n), superscript_char, '^'));
            }
            out.push('√');
            out.push_str(&wrap_operand(&body));
        }
        n if TEXT_WRAPPERS.contains(&n) => {
            out.push_str(&convert(&read_arg(it)));
        }
        n => {
            match SYMBOLS.iter().find(|(k, _)| *k == n) {
                Some((_, sym)) => out.push_str(sym),
                None => out.push_str(n),
            }
            if PREFIX_OPERATORS.contains(&n) {
                while it.peek().is_some_and(|c| c.is_whitespace()) {
                    it.next();
                }
            }
        }
    }
}

fn read_command_name(it: &mut Peekable<Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&c) = it.peek() {
        if c.is_ascii_alphabetic() {
            name.push(c);
            it.next();
        } else {
            break;
        }
    }
    if name.is_empty()
        && let Some(c) = it.next()
    {
        name.push(c);
    }
    name
}

/// Next argument: a braced group, a `\command`, or one character.
fn read_arg(it: &mut Peekable<Chars<'_>>) -> String {
    while it.peek().is_some_and(|c| c.is_whitespace()) {
        it.next();
    }
    match it.peek().copied() {
        Some('{') => {
            it.next();
            read_balanced(it, '{', '}')
        }
        Some('\\') => {
            it.next();
            format!("\\{}", read_command_name(it))
        }
        Some(c) => {
            it.next();
            c.to_string()
        }
        None => String::new(),
    }
}

fn read_optional_arg(it: &mut Peekable<Chars<'_>>) -> Option<String> {
    if it.peek() == Some(&'[') {
        it.next();
        Some(read_balanced(it, '[', ']'))
    } else {
        None
    }
}

fn read_balanced(it: &mut Peekable<Chars<'_>>, open: char, close: char) -> String {
    let mut depth = 1usize;
    let mut body = String::new();
    for c in it.by_ref() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                break;
            }
        }
        body.push(c);
    }
    body
}

fn wrap_operand(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() <= 1 || s.chars().all(|c| c.is_alphanumeric() || c == '.') {
        s.to_owned()
    } else {
        format!("({s})")
    }
}

fn script(arg: &str, map: fn(char) -> Option<char>, marker: char) -> String {
    let arg = arg.trim();
    match arg.chars().map(map).collect::<Option<String>>() {
        Some(s) if !s.is_empty() => s,
        _ if arg.chars().count() == 1 => format!("{marker}{arg}"),
        _ => format!("{marker}({arg})"),
    }
}

fn superscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' => '⁻',
        '(' => '⁽',
        ')' => '⁾',
        'n' => 'ⁿ',
        '°' => '°',
        '′' => '′',
        _ => return None,
    })
}

fn subscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '-' => '₋',
        _ => return None,
    })
}

fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for c in s.trim().chars() {
        if c == ' ' {
            if !prev_space {
                out.push(c);
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_symbols() {
        assert_eq!(tex_to_plain(r"\angle ABC = 90^\circ"), "∠ABC = 90°");
        assert_eq!(tex_to_plain(r"\triangle ABC \cong \triangle DEF"), "△ABC ≅ △DEF");
        assert_eq!(tex_to_plain(r"AB \parallel CD"), "AB ∥ CD");
    }

    #[test]
    fn fractions_and_roots() {
        assert_eq!(tex_to_plain(r"\frac{1}{2}"), "1/2");
        assert_eq!(tex_to_plain(r"\frac{a+b}{2}"), "(a+b)/2");
        assert_eq!(tex_to_plain(r"\sqrt{3}"), "√3");
        assert_eq!(tex_to_plain(r"\sqrt{x+1}"), "√(x+1)");
    }

    #[test]
    fn scripts() {
        assert_eq!(tex_to_plain("a^2 + b^{2} = c^2"), "a² + b² = c²");
        assert_eq!(tex_to_plain("x_1"), "x₁");
        assert_eq!(tex_to_plain("e^{i}"), "e^i");
    }

    #[test]
    fn text_wrappers_and_spacing() {
        assert_eq!(tex_to_plain(r"\text{so}\quad x = 3"), "so x = 3");
        assert_eq!(tex_to_plain(r"\left( x \right)"), "( x )");
        assert_eq!(tex_to_plain("$x$"), "x");
    }

    #[test]
    fn unknown_commands_keep_their_name() {
        assert_eq!(tex_to_plain(r"\foo x"), "foo x");
    }
}

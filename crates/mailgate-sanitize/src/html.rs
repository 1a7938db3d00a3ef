//! HTML body sanitization.
//!
//! A single-pass whitelist filter over the markup: allowed tags are
//! re-emitted with their allowed attributes, disallowed tags are
//! dropped (keeping their text content), and a small set of dangerous
//! container tags is dropped together with its content. No DOM is
//! built; the lexer walks the input once.

/// Tags that survive sanitization.
const ALLOWED_TAGS: &[&str] = &[
    "b", "i", "u", "em", "strong", "s", "strike", "sub", "sup", "small", "span", "div", "p", "br",
    "hr", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "code", "ul", "ol", "li",
    "table", "thead", "tbody", "tfoot", "tr", "td", "th", "caption", "img",
];

/// Tags whose entire content is removed along with the tag itself.
const DROP_CONTENT_TAGS: &[&str] = &["script", "style", "iframe", "object", "embed", "svg", "head", "title"];

/// Attributes that survive on allowed tags.
const ALLOWED_ATTRS: &[&str] = &["src", "alt", "title", "width", "height", "style", "class", "align"];

/// URL schemes accepted in `src` values (`cid` carries inline images).
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "data", "cid"];

/// CSS properties accepted inside `style` values.
const ALLOWED_CSS_PROPS: &[&str] = &[
    "color",
    "background-color",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "text-align",
    "text-decoration",
    "margin",
    "padding",
    "border",
    "width",
    "height",
    "vertical-align",
];

/// Applies the HTML whitelist to a message body.
///
/// Text content is preserved; tags outside the whitelist are removed,
/// and `script`/`style`-class containers are removed together with
/// their content. Attribute and URL-scheme filtering follows the
/// whitelists above.
#[must_use]
pub fn sanitize_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut lexer = Lexer::new(html);

    while let Some(c) = lexer.peek() {
        if c != '<' {
            out.push(c);
            lexer.bump();
            continue;
        }

        if lexer.starts_with("<!--") {
            lexer.skip_past("-->");
            continue;
        }
        if lexer.starts_with("<!") || lexer.starts_with("<?") {
            lexer.skip_past(">");
            continue;
        }

        match lexer.parse_tag() {
            Some(tag) => {
                let name = tag.name.as_str();
                if !tag.closing && DROP_CONTENT_TAGS.contains(&name) {
                    lexer.skip_past_close_tag(name);
                } else if ALLOWED_TAGS.contains(&name) {
                    emit_tag(&mut out, &tag);
                }
                // Disallowed but harmless tags are dropped, content kept.
            }
            None => {
                // Not a parseable tag: emit the angle bracket as text.
                out.push_str("&lt;");
                lexer.bump();
            }
        }
    }

    out
}

/// One parsed tag.
struct Tag {
    name: String,
    closing: bool,
    self_closing: bool,
    attrs: Vec<(String, Option<String>)>,
}

fn emit_tag(out: &mut String, tag: &Tag) {
    out.push('<');
    if tag.closing {
        out.push('/');
    }
    out.push_str(&tag.name);

    if !tag.closing {
        for (name, value) in &tag.attrs {
            if !ALLOWED_ATTRS.contains(&name.as_str()) {
                continue;
            }
            let Some(filtered) = filter_attr_value(name, value.as_deref()) else {
                continue;
            };
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(&filtered));
            out.push('"');
        }
        if tag.self_closing {
            out.push_str(" /");
        }
    }
    out.push('>');
}

/// Returns the value to emit for an allowed attribute, or `None` to
/// drop the attribute entirely.
fn filter_attr_value(name: &str, value: Option<&str>) -> Option<String> {
    let value = value.unwrap_or("").trim();
    match name {
        "src" => {
            if has_allowed_scheme(value) {
                Some(value.to_string())
            } else {
                None
            }
        }
        "style" => {
            let filtered = filter_css(value);
            if filtered.is_empty() {
                None
            } else {
                Some(filtered)
            }
        }
        _ => Some(value.to_string()),
    }
}

fn has_allowed_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    match lower.split_once(':') {
        // A colon before any path separator marks an explicit scheme.
        Some((scheme, _)) if !scheme.contains('/') => ALLOWED_SCHEMES.contains(&scheme),
        _ => !lower.is_empty(),
    }
}

fn filter_css(style: &str) -> String {
    let mut kept = Vec::new();
    for declaration in style.split(';') {
        let Some((prop, value)) = declaration.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value.trim();
        let value_lower = value.to_ascii_lowercase();
        if ALLOWED_CSS_PROPS.contains(&prop.as_str())
            && !value_lower.contains("url(")
            && !value_lower.contains("expression(")
        {
            kept.push(format!("{prop}: {value}"));
        }
    }
    kept.join("; ")
}

fn escape_attr(value: &str) -> String {
    value.replace('"', "&quot;").replace('<', "&lt;")
}

/// Minimal forward-only lexer over the input markup.
struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    /// Advances past the next occurrence of `needle`, or to the end of
    /// input if it never occurs.
    fn skip_past(&mut self, needle: &str) {
        match self.rest().find(needle) {
            Some(idx) => self.pos += idx + needle.len(),
            None => self.pos = self.input.len(),
        }
    }

    /// Advances past `</name ... >`, or to the end of input.
    fn skip_past_close_tag(&mut self, name: &str) {
        let lower_rest = self.rest().to_ascii_lowercase();
        let close = format!("</{name}");
        match lower_rest.find(&close) {
            Some(idx) => {
                self.pos += idx + close.len();
                self.skip_past(">");
            }
            None => self.pos = self.input.len(),
        }
    }

    /// Tries to parse a tag at the current position (which must be `<`).
    ///
    /// On success the lexer is positioned after the closing `>`. On
    /// failure the position is unchanged.
    fn parse_tag(&mut self) -> Option<Tag> {
        let start = self.pos;
        debug_assert_eq!(self.peek(), Some('<'));
        self.bump();

        let closing = if self.peek() == Some('/') {
            self.bump();
            true
        } else {
            false
        };

        let name = self.take_while(|c| c.is_ascii_alphanumeric());
        if name.is_empty() {
            self.pos = start;
            return None;
        }
        let name = name.to_ascii_lowercase();

        let mut attrs = Vec::new();
        let mut self_closing = false;
        loop {
            self.take_while(char::is_whitespace);
            match self.peek() {
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('/') => {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                        self_closing = true;
                        break;
                    }
                }
                Some(_) => {
                    let Some(attr) = self.parse_attr() else {
                        self.pos = start;
                        return None;
                    };
                    attrs.push(attr);
                }
                None => {
                    self.pos = start;
                    return None;
                }
            }
        }

        Some(Tag {
            name,
            closing,
            self_closing,
            attrs,
        })
    }

    fn parse_attr(&mut self) -> Option<(String, Option<String>)> {
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if name.is_empty() {
            return None;
        }
        let name = name.to_ascii_lowercase();

        self.take_while(char::is_whitespace);
        if self.peek() != Some('=') {
            return Some((name, None));
        }
        self.bump();
        self.take_while(char::is_whitespace);

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let value = self.take_while(|c| c != quote);
                self.bump()?;
                value
            }
            Some(_) => self.take_while(|c| !c.is_whitespace() && c != '>' && c != '/'),
            None => return None,
        };

        Some((name, Some(value)))
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            taken.push(c);
            self.bump();
        }
        taken
    }
}

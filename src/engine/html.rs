use std::borrow::Cow;

/// Escapes `&`, `<`, `>` and both quote characters, so the result is safe both
/// as element text and inside a quoted attribute.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    html_escape::encode_quoted_attribute(text)
}

pub fn heading(level: u8, text: &str) -> String {
    format!("<h{level}>{}</h{level}>", escape_html(text))
}

/// Bold wraps the escaped text first, italic wraps the result.
pub fn paragraph(text: &str, bold: bool, italic: bool) -> String {
    let mut inner = escape_html(text).into_owned();
    if bold {
        inner = format!("<strong>{inner}</strong>");
    }
    if italic {
        inner = format!("<em>{inner}</em>");
    }
    format!("<p>{inner}</p>")
}

pub fn image(src: &str) -> String {
    format!("<p><img src=\"{}\" alt=\"\"></p>", escape_html(src))
}

/// Renders a cell grid. The first row is always header cells but only moves
/// into a `<thead>` when more rows follow it; an empty grid renders nothing.
pub fn table(rows: &[Vec<String>]) -> Option<String> {
    let (first, rest) = rows.split_first()?;

    if rest.is_empty() {
        return Some(format!(
            "<table><tbody>{}</tbody></table>",
            table_row(first, "th")
        ));
    }

    let body = rest
        .iter()
        .map(|row| table_row(row, "td"))
        .collect::<String>();
    Some(format!(
        "<table><thead>{}</thead><tbody>{body}</tbody></table>",
        table_row(first, "th")
    ))
}

fn table_row(cells: &[String], tag: &str) -> String {
    let cells = cells
        .iter()
        .map(|cell| format!("<{tag}>{}</{tag}>", escape_html(cell.trim())))
        .collect::<String>();
    format!("<tr>{cells}</tr>")
}

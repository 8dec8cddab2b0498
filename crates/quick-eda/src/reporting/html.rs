//! Self-contained HTML rendering of a [`ReportDocument`].

use std::fmt::Write;

use super::document::{ReportDocument, ReportSection, SectionKind, Table};
use crate::utils::escape_html;

const STYLE: &str = "\
body { font-family: -apple-system, 'Segoe UI', Helvetica, Arial, sans-serif;
       margin: 2rem auto; max-width: 1000px; color: #222; }
h1 { border-bottom: 2px solid #4682b4; padding-bottom: .3rem; }
h2 { margin-top: 2.5rem; color: #2c3e50; }
section { margin-bottom: 2rem; }
table { border-collapse: collapse; margin: .8rem 0; min-width: 320px; }
caption { text-align: left; font-weight: 600; padding: .3rem 0; }
th, td { border: 1px solid #ddd; padding: .3rem .7rem; text-align: left; }
th { background: #f4f6f8; }
td.key { font-weight: 600; background: #fafafa; }
figure { margin: 1rem 0; }
figure img { max-width: 100%; border: 1px solid #eee; }
figcaption { color: #555; font-size: .9rem; }
ul.notes li { color: #8a5a00; }
";

/// Render the whole document as one HTML page.
pub fn render_html(document: &ReportDocument) -> String {
    let mut html = String::with_capacity(16 * 1024);
    let title = escape_html(&document.title);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{title}</title>");
    let _ = writeln!(html, "<style>\n{STYLE}</style>\n</head>\n<body>");
    let _ = writeln!(html, "<h1>{title}</h1>");
    let _ = writeln!(
        html,
        "<p class=\"generated\">Generated {}</p>",
        escape_html(&document.generated_at)
    );

    let mut current: Option<SectionKind> = None;
    for section in &document.sections {
        if current != Some(section.kind) {
            if let Some(heading) = group_heading(section.kind) {
                let _ = writeln!(html, "<h2>{heading}</h2>");
            }
            current = Some(section.kind);
        }
        render_section(&mut html, section);
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn group_heading(kind: SectionKind) -> Option<&'static str> {
    match kind {
        SectionKind::Overview => None,
        SectionKind::Descriptive => Some("Descriptive statistics"),
        SectionKind::Relationship => Some("Relationships with the target"),
    }
}

fn render_section(html: &mut String, section: &ReportSection) {
    let tag = match section.kind {
        SectionKind::Overview => "h2",
        _ => "h3",
    };
    html.push_str("<section>\n");
    let _ = writeln!(html, "<{tag}>{}</{tag}>", escape_html(&section.heading));

    for table in &section.tables {
        render_table(html, table);
    }

    if !section.notes.is_empty() {
        html.push_str("<ul class=\"notes\">\n");
        for note in &section.notes {
            let _ = writeln!(html, "<li>{}</li>", escape_html(note));
        }
        html.push_str("</ul>\n");
    }

    for image in &section.images {
        let caption = escape_html(&image.caption);
        let _ = writeln!(
            html,
            "<figure>\n<img src=\"{}\" alt=\"{caption}\">\n\
             <figcaption>{caption}</figcaption>\n</figure>",
            escape_html(&image.src())
        );
    }
    html.push_str("</section>\n");
}

fn render_table(html: &mut String, table: &Table) {
    html.push_str("<table>\n");
    if let Some(caption) = &table.caption {
        let _ = writeln!(html, "<caption>{}</caption>", escape_html(caption));
    }
    if !table.headers.is_empty() {
        html.push_str("<thead><tr>");
        for header in &table.headers {
            let _ = write!(html, "<th>{}</th>", escape_html(header));
        }
        html.push_str("</tr></thead>\n");
    }
    html.push_str("<tbody>\n");
    let key_value = table.headers.is_empty();
    for row in &table.rows {
        html.push_str("<tr>");
        for (i, cell) in row.iter().enumerate() {
            if key_value && i == 0 {
                let _ = write!(html, "<td class=\"key\">{}</td>", escape_html(cell));
            } else {
                let _ = write!(html, "<td>{}</td>", escape_html(cell));
            }
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
}

//! HTML rendering for the admin page and the embeddable table

use tabula_core::{CachedRecordSet, Column};

/// Escape text for use in HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Per-column visibility for the embeddable table
///
/// A column with no setting is visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnVisibility {
    hidden: [bool; 5],
}

impl ColumnVisibility {
    /// Every column visible
    pub fn all() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: Column, visible: bool) {
        self.hidden[Self::index(column)] = !visible;
    }

    pub fn is_visible(&self, column: Column) -> bool {
        !self.hidden[Self::index(column)]
    }

    /// Apply a query-string style flag; anything but a false-like value shows the column
    pub fn apply_flag(&mut self, column: Column, flag: &str) {
        let hidden = matches!(
            flag.trim().to_ascii_lowercase().as_str(),
            "false" | "0" | "no" | "off"
        );
        self.set(column, !hidden);
    }

    fn index(column: Column) -> usize {
        match column {
            Column::Id => 0,
            Column::FirstName => 1,
            Column::LastName => 2,
            Column::Email => 3,
            Column::Date => 4,
        }
    }
}

/// Render the record set as a `<table>` restricted to visible columns
pub fn render_table(
    record_set: &CachedRecordSet,
    visibility: &ColumnVisibility,
    class: &str,
) -> String {
    let columns: Vec<Column> = record_set
        .columns()
        .into_iter()
        .filter(|c| visibility.is_visible(*c))
        .collect();

    let mut html = String::new();
    html.push_str(&format!(
        "<table class=\"{}\">\n<thead>\n<tr>",
        escape_html(class)
    ));
    for column in &columns {
        html.push_str(&format!("<th>{}</th>", escape_html(column.label())));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for (_, row) in record_set.rows.iter() {
        html.push_str("<tr>");
        for column in &columns {
            html.push_str(&format!("<td>{}</td>", escape_html(&row.cell(*column))));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n");
    html
}

/// Render the embeddable block: title heading and table, or the empty notice
pub fn render_block(record_set: &CachedRecordSet, visibility: &ColumnVisibility) -> String {
    let mut html = String::from("<div class=\"tabula-block\">\n");
    if record_set.is_empty() {
        html.push_str("<p>No data available.</p>\n");
    } else {
        html.push_str(&format!("<h3>{}</h3>\n", escape_html(&record_set.title)));
        html.push_str(&render_table(record_set, visibility, "tabula-table"));
    }
    html.push_str("</div>\n");
    html
}

/// Wrap a body fragment in a complete HTML document
pub fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<link rel=\"stylesheet\" href=\"/static/tabula.css\">\n\
         </head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}

/// Admin page body
pub struct AdminView<'a> {
    pub record_set: &'a CachedRecordSet,
    pub endpoint: &'a str,
    pub nonce: &'a str,
    pub username: &'a str,
    pub refreshed: bool,
    pub show_logout: bool,
}

pub fn render_admin(view: &AdminView<'_>) -> String {
    let mut body = String::from("<div class=\"wrap\" id=\"tabula-admin\">\n");
    body.push_str("<header class=\"tabula-header\">\n<h1>Tabula</h1>\n");
    body.push_str(
        "<p class=\"tabula-subtitle\">Retrieve and display data from the remote API</p>\n",
    );
    if view.show_logout {
        body.push_str(&format!(
            "<form method=\"post\" action=\"/admin/logout\" class=\"tabula-logout\">\
             <span>{}</span> <input type=\"submit\" value=\"Log out\"></form>\n",
            escape_html(view.username)
        ));
    }
    body.push_str("</header>\n");

    if view.refreshed {
        body.push_str(
            "<div class=\"notice notice-success\"><p>Data refreshed successfully.</p></div>\n",
        );
    }

    body.push_str("<div class=\"tabula-card\">\n<h2>Refresh Data</h2>\n");
    body.push_str(&format!(
        "<p class=\"desc\">Click the \"Refresh Data\" button to manually update the data fetched \
         from the <a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">remote API</a>. \
         This process will override the hourly limit and fetch the latest available data.</p>\n",
        escape_html(view.endpoint)
    ));
    body.push_str(&format!(
        "<form method=\"post\" action=\"/admin/refresh\" class=\"tabula-form\">\n\
         <input type=\"hidden\" name=\"_nonce\" value=\"{}\">\n\
         <p><input type=\"submit\" class=\"tabula-btn\" value=\"Refresh Data\"></p>\n</form>\n",
        escape_html(view.nonce)
    ));
    body.push_str("</div>\n");

    body.push_str("<div class=\"tabula-card\">\n<h2>API Data</h2>\n");
    if view.record_set.is_empty() {
        body.push_str("<p class=\"tabula-no-data\">No data available.</p>\n");
    } else {
        body.push_str(&render_table(
            view.record_set,
            &ColumnVisibility::all(),
            "tabula-table striped",
        ));
    }
    body.push_str("</div>\n</div>\n");

    page("Tabula", &body)
}

pub fn render_login(error: bool) -> String {
    let mut body = String::from("<div class=\"wrap tabula-login\">\n<h1>Tabula admin</h1>\n");
    if error {
        body.push_str(
            "<div class=\"notice notice-error\"><p>Invalid username or password.</p></div>\n",
        );
    }
    body.push_str(
        "<form method=\"post\" action=\"/admin/login\">\n\
         <p><label>Username \
         <input type=\"text\" name=\"username\" autocomplete=\"username\" required>\
         </label></p>\n\
         <p><label>Password \
         <input type=\"password\" name=\"password\" autocomplete=\"current-password\" required>\
         </label></p>\n\
         <p><input type=\"submit\" class=\"tabula-btn\" value=\"Log in\"></p>\n\
         </form>\n</div>\n",
    );
    page("Log in - Tabula", &body)
}

//! Table rendering for account profiles

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::client::AuthUser;

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn optional(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

/// Render an account profile as a two-column table
pub fn render_user(user: &AuthUser) -> String {
    let rows = vec![
        Row {
            field: "ID",
            value: user.id.clone(),
        },
        Row {
            field: "Name",
            value: format!("{} {}", user.first_name, user.last_name),
        },
        Row {
            field: "Email",
            value: user.email.clone(),
        },
        Row {
            field: "Rank",
            value: optional(&user.rank),
        },
        Row {
            field: "Directorate",
            value: optional(&user.jdir),
        },
        Row {
            field: "Certificate DN",
            value: optional(&user.subject_name),
        },
        Row {
            field: "Role",
            value: optional(&user.role),
        },
    ];

    Table::new(rows).with(Style::sharp()).to_string()
}

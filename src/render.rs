// 🎨 HTML Rendering
// Pages are plain strings poured into web/layout.html

use crate::admin::AdminView;
use crate::db::{Event, Submission, SubmissionStats, UpsertOutcome};
use crate::export::chart_rows;
use crate::form::{RawSubmission, ValidationError};
use crate::numerology::{interpretation, BirthChart, Gender, LoShuGrid};
use std::fmt::Write as _;

const LAYOUT: &str = include_str!("../web/layout.html");

pub const SITE_NAME: &str = "Predict Me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavItem {
    Home,
    Services,
    About,
    Admin,
}

impl NavItem {
    fn href(&self) -> &'static str {
        match self {
            NavItem::Home => "/",
            NavItem::Services => "/services",
            NavItem::About => "/about",
            NavItem::Admin => "/admin",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            NavItem::Home => "Birth Chart",
            NavItem::Services => "Services",
            NavItem::About => "About Us",
            NavItem::Admin => "Admin",
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn notice(kind: &str, message: &str) -> String {
    format!("<div class=\"notice {}\">{}</div>\n", kind, escape_html(message))
}

/// Wrap a page body with navigation and the contact footer
pub fn layout(title: &str, active: NavItem, body: &str, contact_url: &str) -> String {
    let nav: String = [NavItem::Home, NavItem::Services, NavItem::About, NavItem::Admin]
        .iter()
        .map(|item| {
            let class = if *item == active { " class=\"active\"" } else { "" };
            format!("<a href=\"{}\"{}>{}</a>", item.href(), class, item.label())
        })
        .collect();

    let footer = format!(
        "&copy; {} &middot; For more information, contact us on <a href=\"{}\">WhatsApp Chat</a>.",
        SITE_NAME,
        escape_html(contact_url)
    );

    LAYOUT
        .replace("{{title}}", &escape_html(&format!("{} | {}", SITE_NAME, title)))
        .replace("{{nav}}", &nav)
        .replace("{{footer}}", &footer)
        .replace("{{body}}", body)
}

// ============================================================================
// FORM PAGE
// ============================================================================

fn text_input(name: &str, label: &str, value: &str, placeholder: &str, errors: &[ValidationError]) -> String {
    let mut html = format!(
        "<label for=\"{name}\">{label}</label>\n<input type=\"text\" id=\"{name}\" name=\"{name}\" value=\"{value}\" placeholder=\"{placeholder}\">\n",
        name = name,
        label = label,
        value = escape_html(value),
        placeholder = placeholder,
    );
    for error in errors.iter().filter(|e| e.field == name) {
        html.push_str(&notice("error", &error.message));
    }
    html
}

pub fn form_page(raw: &RawSubmission, errors: &[ValidationError], contact_url: &str) -> String {
    let mut body = String::new();
    body.push_str("<h1>🌟 Birth Chart Generator 🌟</h1>\n");
    body.push_str("<p>Generate your Birth Chart with interpretations and insights!</p>\n");

    if errors.is_empty() && !raw.is_complete() {
        body.push_str(&notice(
            "info",
            "Please fill out all required fields: Full Name, Date of Birth, and Gender.",
        ));
    }

    body.push_str("<form class=\"chart-form\" method=\"post\" action=\"/chart\">\n");
    body.push_str(&text_input("first_name", "Enter your First Name:", &raw.first_name, "e.g., Mohan", errors));
    body.push_str(&text_input("last_name", "Enter your Last Name:", &raw.last_name, "e.g., Kumar", errors));
    body.push_str(&text_input("dob", "Enter your Date of Birth (DD-MM-YYYY):", &raw.dob, "e.g., 25-11-1987", errors));
    body.push_str(&text_input("birth_time", "Enter your Birth Time (HH:MM:SS):", &raw.birth_time, "e.g., 10:45:00", errors));
    body.push_str(&text_input("place_of_birth", "Enter your Place of Birth:", &raw.place_of_birth, "e.g., New Delhi, India", errors));
    body.push_str(&text_input("phone_number", "Enter your Phone Number:", &raw.phone_number, "e.g., +91-9876543210", errors));

    let selected = Gender::parse(&raw.gender).unwrap_or(Gender::Unspecified);
    body.push_str("<label>Select your Gender:</label>\n<div class=\"radio-group\">\n");
    for gender in [Gender::Male, Gender::Female, Gender::Unspecified] {
        let checked = if gender == selected { " checked" } else { "" };
        let _ = writeln!(
            body,
            "<label><input type=\"radio\" name=\"gender\" value=\"{0}\"{1}> {0}</label>",
            gender.as_str(),
            checked
        );
    }
    body.push_str("</div>\n");
    for error in errors.iter().filter(|e| e.field == "gender") {
        body.push_str(&notice("error", &error.message));
    }

    body.push_str("<button type=\"submit\">Generate Birth Chart</button>\n</form>\n");

    layout("Get your free Birth Chart", NavItem::Home, &body, contact_url)
}

// ============================================================================
// CHART PAGE
// ============================================================================

/// 3x3 grid, missing cells red and repeated cells green
pub fn lo_shu_table(grid: &LoShuGrid) -> String {
    let mut html = String::from("<table class=\"lo-shu\">\n");
    for row in grid.rows() {
        html.push_str("<tr>");
        for (digit, count) in row {
            let _ = write!(
                html,
                "<td class=\"{}\">{}: {}</td>",
                grid.status(digit).css_class(),
                digit,
                count
            );
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}

pub fn interpretation_list(grid: &LoShuGrid) -> String {
    let mut html = String::from("<ul class=\"interpretations\">\n");
    for (digit, _) in grid.iter() {
        let _ = writeln!(
            html,
            "<li><strong>{} ({}):</strong> {}</li>",
            digit,
            grid.status(digit).label(),
            interpretation(digit).unwrap_or_default()
        );
    }
    html.push_str("</ul>\n");
    html
}

pub fn final_chart_table(chart: &BirthChart) -> String {
    let mut html = String::from("<table class=\"data\">\n<tr><th>Attribute</th><th>Value</th></tr>\n");
    for (attribute, value) in chart_rows(chart) {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(&attribute),
            escape_html(&value)
        );
    }
    html.push_str("</table>\n");
    html
}

/// What happened to the submission on the storage side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Saved(UpsertOutcome),
    NoPhone,
    Failed,
}

/// `download_query` is the already url-encoded form, reused for the PDF/CSV links
pub fn chart_page(chart: &BirthChart, save: SaveStatus, download_query: &str, contact_url: &str) -> String {
    let mut body = String::new();
    body.push_str("<h1>🌟 Your Birth Chart 🌟</h1>\n");
    body.push_str(&notice("success", "Valid Date of Birth!"));

    match save {
        SaveStatus::Saved(UpsertOutcome::Inserted) => {
            body.push_str(&notice("success", "All input data validated successfully!"))
        }
        SaveStatus::Saved(UpsertOutcome::Updated) => {
            body.push_str(&notice("success", "Your details were updated successfully!"))
        }
        SaveStatus::NoPhone => body.push_str(&notice(
            "info",
            "No phone number given, so your details were not stored.",
        )),
        SaveStatus::Failed => body.push_str(&notice(
            "warning",
            "Your chart is ready, but we could not store your details.",
        )),
    }

    if chart.kuaa.is_none() {
        body.push_str(&notice(
            "warning",
            "Gender not specified. Kunvar value cannot be calculated. Please provide Male or Female.",
        ));
    }

    let _ = writeln!(body, "<h3>Full Name: {}</h3>", escape_html(&chart.full_name));
    let _ = writeln!(body, "<h3>Your Driver Value: {}</h3>", chart.driver);
    let _ = writeln!(body, "<h3>Your Conductor Value: {}</h3>", chart.conductor);
    if let Some(kuaa) = chart.kuaa {
        let _ = writeln!(body, "<h3>Your Kunvar Value: {}</h3>", kuaa);
    }
    let _ = writeln!(body, "<h3>Your Chaldean Name Number: {}</h3>", chart.chaldean);

    body.push_str("<h3>Your Lo Shu Grid Birth Chart:</h3>\n");
    body.push_str(&lo_shu_table(&chart.grid));

    body.push_str("<h3>Interpretations for Individual Numbers:</h3>\n");
    body.push_str(&interpretation_list(&chart.grid));

    body.push_str("<h3>Final Birth Chart:</h3>\n");
    body.push_str(&final_chart_table(chart));

    let _ = writeln!(
        body,
        "<p>To consult further with an Astrologer/Numerologist regarding the generated birth chart, \
         use the <a href=\"{}\">WhatsApp Chat</a> link to connect and consult.</p>",
        escape_html(contact_url)
    );
    let _ = writeln!(
        body,
        "<p><a href=\"/chart.pdf?{q}\">Download Your Birth Chart as PDF</a> &middot; \
         <a href=\"/chart.csv?{q}\">Download as CSV</a></p>",
        q = escape_html(download_query)
    );

    layout("Your Birth Chart", NavItem::Home, &body, contact_url)
}

// ============================================================================
// STATIC PAGES
// ============================================================================

pub const SERVICES: [&str; 6] = [
    "Birth Chart Generator",
    "Numerology Reading",
    "Astrology Consultation",
    "Relationship Compatibility Analysis",
    "Career and Financial Guidance",
    "Personalized Insights and Recommendations",
];

pub fn services_page(contact_url: &str) -> String {
    let mut body = String::from("<h1>Services</h1>\n<p>We offer the following services:</p>\n<ul>\n");
    for service in SERVICES {
        let _ = writeln!(body, "<li>{}</li>", service);
    }
    body.push_str("</ul>\n");
    layout("Services", NavItem::Services, &body, contact_url)
}

pub fn about_page(contact_url: &str) -> String {
    let body = "<h1>About Us</h1>\n\
        <p>We are a team of passionate individuals who are dedicated to providing accurate and insightful birth chart readings.</p>\n\
        <p>Our mission is to help you understand your birth chart and unlock your potential.</p>\n\
        <p>We use the ancient wisdom of numerology to provide you with personalized insights and recommendations.</p>\n";
    layout("About Us", NavItem::About, body, contact_url)
}

// ============================================================================
// ADMIN PAGES
// ============================================================================

pub fn admin_login_page(error: Option<&str>, enabled: bool, contact_url: &str) -> String {
    let mut body = String::from("<h1>Admin Login</h1>\n");
    if !enabled {
        body.push_str(&notice("warning", "Admin login is disabled: no admin password is configured."));
    }
    if let Some(message) = error {
        body.push_str(&notice("error", message));
    }
    body.push_str(
        "<form class=\"chart-form\" method=\"post\" action=\"/admin/login\">\n\
         <label for=\"username\">Username</label>\n<input type=\"text\" id=\"username\" name=\"username\">\n\
         <label for=\"password\">Password</label>\n<input type=\"password\" id=\"password\" name=\"password\">\n\
         <button type=\"submit\">Log in</button>\n</form>\n",
    );
    layout("Admin", NavItem::Admin, &body, contact_url)
}

/// Data for whichever admin view is showing
pub enum AdminContent<'a> {
    Records(&'a [Submission]),
    Aggregates(&'a SubmissionStats),
    Events(&'a [Event]),
}

impl AdminContent<'_> {
    pub fn view(&self) -> AdminView {
        match self {
            AdminContent::Records(_) => AdminView::Records,
            AdminContent::Aggregates(_) => AdminView::Aggregates,
            AdminContent::Events(_) => AdminView::Events,
        }
    }
}

fn records_table(submissions: &[Submission]) -> String {
    if submissions.is_empty() {
        return notice("info", "No submissions stored yet.");
    }
    let mut html = String::from(
        "<table class=\"data\">\n<tr><th>Name</th><th>DOB</th><th>Gender</th><th>Phone</th>\
         <th>Place</th><th>Driver</th><th>Conductor</th><th>Kunvar</th><th>Chaldean</th><th></th></tr>\n",
    );
    for s in submissions {
        let phone = escape_html(&s.phone_number);
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td><form method=\"post\" action=\"/admin/delete/{}\"><button type=\"submit\">Delete</button></form></td></tr>",
            escape_html(&s.full_name()),
            escape_html(&s.dob),
            escape_html(&s.gender),
            phone,
            escape_html(s.place_of_birth.as_deref().unwrap_or("")),
            s.driver,
            s.conductor,
            s.kuaa_display(),
            s.chaldean,
            phone,
        );
    }
    html.push_str("</table>\n<p><a href=\"/admin/export.csv\">Export all records as CSV</a></p>\n");
    html
}

fn count_table<K: std::fmt::Display>(title: &str, rows: &[(K, i64)]) -> String {
    let mut html = format!(
        "<h3>{}</h3>\n<table class=\"data\">\n<tr><th>Value</th><th>Count</th></tr>\n",
        escape_html(title)
    );
    for (key, count) in rows {
        let _ = writeln!(html, "<tr><td>{}</td><td>{}</td></tr>", escape_html(&key.to_string()), count);
    }
    html.push_str("</table>\n");
    html
}

fn aggregates_section(stats: &SubmissionStats) -> String {
    let mut html = format!("<p>Total submissions: <strong>{}</strong></p>\n", stats.total);
    html.push_str(&count_table("By Gender", &stats.by_gender));
    html.push_str(&count_table("By Driver", &stats.by_driver));
    html.push_str(&count_table("By Conductor", &stats.by_conductor));
    let kuaa: Vec<(String, i64)> = stats
        .by_kuaa
        .iter()
        .map(|(k, c)| (k.map(|v| v.to_string()).unwrap_or_else(|| "Not Available".to_string()), *c))
        .collect();
    html.push_str(&count_table("By Kunvar", &kuaa));
    html.push_str(&count_table("By Chaldean Name Number", &stats.by_chaldean));
    html
}

fn events_table(events: &[Event]) -> String {
    let mut html = String::from(
        "<table class=\"data\">\n<tr><th>Time</th><th>Event</th><th>Entity</th><th>Actor</th></tr>\n",
    );
    for event in events {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            escape_html(&event.event_type),
            escape_html(&event.entity_id),
            escape_html(&event.actor)
        );
    }
    html.push_str("</table>\n");
    html
}

pub fn admin_panel_page(content: &AdminContent<'_>, flash: Option<&str>, contact_url: &str) -> String {
    let active = content.view();
    let mut body = String::from("<h1>Admin Panel</h1>\n<div class=\"tabs\">");
    for view in AdminView::all() {
        let class = if view == active { " class=\"active\"" } else { "" };
        let _ = write!(body, "<a href=\"/admin?view={}\"{}>{}</a>", view.slug(), class, view.title());
    }
    body.push_str(
        "<form method=\"post\" action=\"/admin/logout\" style=\"display:inline\">\
         <button type=\"submit\">Log out</button></form></div>\n",
    );

    if let Some(message) = flash {
        body.push_str(&notice("success", message));
    }

    match content {
        AdminContent::Records(submissions) => body.push_str(&records_table(submissions)),
        AdminContent::Aggregates(stats) => body.push_str(&aggregates_section(stats)),
        AdminContent::Events(events) => body.push_str(&events_table(events)),
    }

    layout("Admin Panel", NavItem::Admin, &body, contact_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerology::{BirthRecord, Gender};
    use chrono::NaiveDate;

    const CONTACT: &str = "https://wa.me/917205467646";

    fn create_test_chart(gender: Gender) -> BirthChart {
        BirthChart::compute(&BirthRecord {
            first_name: "Mohan".to_string(),
            last_name: "<Kumar>".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1987, 11, 25).unwrap(),
            gender,
            birth_time: None,
            place_of_birth: None,
            phone_number: None,
        })
        .unwrap()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_layout_fills_placeholders() {
        let html = layout("Services", NavItem::Services, "<p>body</p>", CONTACT);

        assert!(html.contains("<title>Predict Me | Services</title>"));
        assert!(html.contains("<a href=\"/services\" class=\"active\">Services</a>"));
        assert!(html.contains("<p>body</p>"));
        assert!(html.contains(CONTACT));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_lo_shu_table_classes() {
        let grid = LoShuGrid::new(&[1, 1, 5], 2, 9, None);
        let html = lo_shu_table(&grid);

        assert!(html.contains("<td class=\"repeated\">1: 2</td>"));
        assert!(html.contains("<td class=\"normal\">5: 1</td>"));
        assert!(html.contains("<td class=\"missing\">4: 0</td>"));
        // layout order: first row is 4 9 2
        let first_row = html.lines().nth(1).unwrap();
        assert!(first_row.find("4: ").unwrap() < first_row.find("9: ").unwrap());
    }

    #[test]
    fn test_interpretation_labels() {
        let grid = LoShuGrid::new(&[1, 1, 5], 2, 9, None);
        let html = interpretation_list(&grid);

        assert!(html.contains("<strong>1 (Repeated 2 times):</strong> Leadership"));
        assert!(html.contains("<strong>5 (Present):</strong>"));
        assert!(html.contains("<strong>3 (Missing):</strong>"));
    }

    #[test]
    fn test_chart_page_unspecified_gender() {
        let chart = create_test_chart(Gender::Unspecified);
        let html = chart_page(&chart, SaveStatus::NoPhone, "first_name=Mohan&dob=25-11-1987", CONTACT);

        assert!(html.contains("Kunvar value cannot be calculated"));
        assert!(!html.contains("Your Kunvar Value"));
        assert!(html.contains("<td>Kunvar Value</td><td>Not Available</td>"));
        // names are escaped
        assert!(html.contains("Mohan &lt;Kumar&gt;"));
        assert!(html.contains("/chart.pdf?first_name=Mohan&amp;dob=25-11-1987"));
    }

    #[test]
    fn test_chart_page_male() {
        let chart = create_test_chart(Gender::Male);
        let html = chart_page(&chart, SaveStatus::Saved(UpsertOutcome::Inserted), "", CONTACT);

        assert!(html.contains("Your Kunvar Value: 4"));
        assert!(html.contains("All input data validated successfully!"));
    }

    #[test]
    fn test_form_page_shows_errors_and_values() {
        let raw = RawSubmission {
            first_name: "Mohan".to_string(),
            dob: "31-02-1990".to_string(),
            ..Default::default()
        };
        let errors = vec![ValidationError {
            field: "dob".to_string(),
            message: "31-02-1990 is not a valid calendar date".to_string(),
        }];

        let html = form_page(&raw, &errors, CONTACT);
        assert!(html.contains("value=\"Mohan\""));
        assert!(html.contains("31-02-1990 is not a valid calendar date"));
        assert!(html.contains("value=\"NA\" checked"));
    }

    #[test]
    fn test_form_page_prompts_when_empty() {
        let html = form_page(&RawSubmission::default(), &[], CONTACT);
        assert!(html.contains("Please fill out all required fields"));
    }

    #[test]
    fn test_admin_panel_tabs() {
        let stats = SubmissionStats {
            total: 2,
            by_gender: vec![("Male".to_string(), 2)],
            by_kuaa: vec![(None, 1), (Some(4), 1)],
            ..Default::default()
        };
        let html = admin_panel_page(&AdminContent::Aggregates(&stats), None, CONTACT);

        assert!(html.contains("<a href=\"/admin?view=aggregates\" class=\"active\">Aggregates</a>"));
        assert!(html.contains("Total submissions: <strong>2</strong>"));
        assert!(html.contains("<td>Not Available</td><td>1</td>"));
    }

    #[test]
    fn test_admin_records_empty() {
        let html = admin_panel_page(&AdminContent::Records(&[]), Some("Deleted"), CONTACT);
        assert!(html.contains("No submissions stored yet."));
        assert!(html.contains("Deleted"));
    }
}

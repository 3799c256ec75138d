//! HTML pages
//!
//! Pages are rendered inline; every value coming from users or uploads goes
//! through [`escape`].

use axum::response::Html;
use grade_common::models::{RosterRow, ScoreRecord, StudentAccount};
use grade_common::stats::GradeReport;

const STYLE: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background-color: #1a1a1a;
            color: #e0e0e0;
            line-height: 1.6;
        }
        header {
            background-color: #2a2a2a;
            border-bottom: 1px solid #3a3a3a;
            padding: 20px;
            margin-bottom: 30px;
        }
        h1 { font-size: 26px; color: #4a9eff; }
        h2 { color: #4a9eff; margin: 20px 0 10px; }
        .content { padding: 0 20px 40px; max-width: 1100px; margin: 0 auto; }
        .subtitle { color: #888; font-size: 16px; }
        .button {
            display: inline-block;
            padding: 8px 18px;
            background: #4a9eff;
            color: white;
            text-decoration: none;
            border: none;
            border-radius: 4px;
            margin: 10px 5px 10px 0;
            font-weight: 600;
            cursor: pointer;
        }
        .button.danger { background: #ef4444; }
        table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
        th, td { border-bottom: 1px solid #3a3a3a; padding: 6px 10px; text-align: left; }
        th { color: #4a9eff; }
        .stats { display: grid; grid-template-columns: repeat(auto-fill, minmax(180px, 1fr)); gap: 12px; }
        .stat { background: #2a2a2a; border-radius: 6px; padding: 12px; }
        .stat .value { font-size: 22px; font-weight: 600; }
        form.inline { display: inline; }
"#;

/// Escape text for HTML element and attribute content
pub fn escape(text: &str) -> String {
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

/// Dashboard location for a subject (admin mode carries it in the query)
pub fn dashboard_url(subject: &str, admin: bool) -> String {
    if admin {
        format!("/teacher/dashboard?subject={}", urlencoding::encode(subject))
    } else {
        "/teacher/dashboard".to_string()
    }
}

fn page(app_name: &str, title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - {app}</title>
    <style>{STYLE}</style>
</head>
<body>
    <header>
        <h1>{app}</h1>
        <div class="subtitle">{title}</div>
    </header>
    <div class="content">
{body}
    </div>
</body>
</html>
"#,
        app = escape(app_name),
        title = escape(title),
    ))
}

fn fmt_score(value: f64) -> String {
    format!("{value:.2}")
}

pub fn signed_out_page(app_name: &str, admin: bool) -> Html<String> {
    let blurb = if admin {
        "Teacher console. Sign in with a whitelisted account."
    } else {
        "Sign in to view your grades and how they compare with your class."
    };
    let body = format!(
        r#"        <p>{blurb}</p>
        <a class="button" href="/login">Sign in</a>"#
    );
    page(app_name, "Welcome", &body)
}

pub fn student_home_page(app_name: &str, account: &StudentAccount, is_teacher: bool) -> Html<String> {
    let teacher_link = if is_teacher {
        r#"<a class="button" href="/teacher/dashboard">Teacher dashboard</a>"#
    } else {
        ""
    };
    let body = format!(
        r#"        <p>Signed in as {name} ({email})</p>
        <p>Student ID {sid}, class {class}, subject {subject}</p>
        <a class="button" href="/my-grades">My grades</a>
        {teacher_link}
        <a class="button" href="/logout">Sign out</a>"#,
        name = escape(&account.name),
        email = escape(&account.email),
        sid = escape(&account.student_id),
        class = escape(&account.class),
        subject = escape(&account.subject),
    );
    page(app_name, "Home", &body)
}

pub fn admin_home_page(app_name: &str, email: &str, subjects: &[String]) -> Html<String> {
    let links: String = subjects
        .iter()
        .map(|s| {
            format!(
                r#"            <li><a class="button" href="{}">{}</a></li>
"#,
                escape(&dashboard_url(s, true)),
                escape(s)
            )
        })
        .collect();
    let body = format!(
        r#"        <p>Signed in as {email}</p>
        <h2>Subjects</h2>
        <ul>
{links}        </ul>
        <a class="button" href="/logout">Sign out</a>"#,
        email = escape(email),
    );
    page(app_name, "Subjects", &body)
}

pub fn register_page(app_name: &str, email: &str) -> Html<String> {
    let body = format!(
        r#"        <p>Signed in as {email}. Enter your student ID to link this account.</p>
        <form method="post" action="/register">
            <input type="text" name="student_id" required autofocus>
            <button class="button" type="submit">Register</button>
        </form>"#,
        email = escape(email),
    );
    page(app_name, "Register", &body)
}

pub fn no_grades_page(app_name: &str, account: &StudentAccount) -> Html<String> {
    let body = format!(
        r#"        <p>No grades have been published for {subject} yet, {name}.</p>
        <a class="button" href="/">Back</a>"#,
        subject = escape(&account.subject),
        name = escape(&account.name),
    );
    page(app_name, "My grades", &body)
}

pub fn report_page(app_name: &str, account: &StudentAccount, report: &GradeReport) -> Html<String> {
    let stats = &report.statistics;

    let rows: String = report
        .items
        .iter()
        .map(|item| {
            format!(
                "                <tr><td>{}</td><td>{}</td></tr>\n",
                escape(&item.item_name),
                fmt_score(item.score)
            )
        })
        .collect();

    let top3 = stats
        .top3
        .iter()
        .map(|t| fmt_score(*t))
        .collect::<Vec<_>>()
        .join(" / ");

    let body = format!(
        r#"        <p>{name} ({sid}), class {class}</p>
        <h2>Scores</h2>
        <table>
            <thead><tr><th>Item</th><th>Score</th></tr></thead>
            <tbody>
{rows}            </tbody>
        </table>
        <h2>Class comparison</h2>
        <div class="stats">
            <div class="stat">My total<div class="value">{my_total}</div></div>
            <div class="stat">Class mean<div class="value">{mean}</div></div>
            <div class="stat">Std. deviation<div class="value">{std_dev}</div></div>
            <div class="stat">Lowest<div class="value">{min}</div></div>
            <div class="stat">Highest<div class="value">{max}</div></div>
            <div class="stat">Percentile<div class="value">{percentile}</div></div>
            <div class="stat">Top 3<div class="value">{top3}</div></div>
            <div class="stat">Final exam weight needed<div class="value">{final_weight}</div></div>
        </div>
        <p class="subtitle">Compared with {count} classmates who have scores.</p>
        <a class="button" href="/">Back</a>"#,
        name = escape(&account.name),
        sid = escape(&report.student_id),
        class = escape(&report.class),
        my_total = fmt_score(stats.my_total),
        mean = fmt_score(stats.mean),
        std_dev = fmt_score(stats.std_dev),
        min = fmt_score(stats.min),
        max = fmt_score(stats.max),
        percentile = stats.percentile,
        final_weight = fmt_score(stats.final_weight),
        count = stats.count,
    );
    page(app_name, "My grades", &body)
}

pub fn dashboard_page(
    app_name: &str,
    subject: &str,
    admin: bool,
    records: &[ScoreRecord],
    roster: &[RosterRow],
) -> Html<String> {
    let subject_field = if admin {
        format!(r#"<input type="hidden" name="subject" value="{}">"#, escape(subject))
    } else {
        String::new()
    };

    let roster_rows: String = roster
        .iter()
        .map(|r| {
            format!(
                "                <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&r.class),
                escape(&r.student_id),
                escape(&r.name),
                escape(r.email.as_deref().unwrap_or("-")),
            )
        })
        .collect();

    let record_rows: String = records
        .iter()
        .map(|g| {
            format!(
                r#"                <tr><td>{sid}</td><td>{item}</td><td>{score}</td><td>{at}</td><td><form class="inline" method="post" action="/teacher/delete/{id}"><button class="button danger" type="submit">Delete</button></form></td></tr>
"#,
                sid = escape(&g.student_id),
                item = escape(&g.item_name),
                score = fmt_score(g.score),
                at = g.updated_at.format("%Y-%m-%d %H:%M"),
                id = g.id,
            )
        })
        .collect();

    let body = format!(
        r#"        <h2>Upload</h2>
        <form method="post" action="/teacher/upload-roster" enctype="multipart/form-data">
            {subject_field}
            Roster CSV <input type="file" name="roster_file" accept=".csv">
            <button class="button" type="submit">Upload roster</button>
        </form>
        <form method="post" action="/teacher/upload" enctype="multipart/form-data">
            {subject_field}
            Grade sheet CSV <input type="file" name="csv_file" accept=".csv">
            <button class="button" type="submit">Upload grades</button>
        </form>
        <h2>Roster ({roster_count})</h2>
        <form class="inline" method="post" action="/teacher/delete-roster">
            {subject_field}
            <button class="button danger" type="submit">Delete roster</button>
        </form>
        <table>
            <thead><tr><th>Class</th><th>Student ID</th><th>Name</th><th>Account</th></tr></thead>
            <tbody>
{roster_rows}            </tbody>
        </table>
        <h2>Grades ({record_count})</h2>
        <form class="inline" method="post" action="/teacher/delete-all">
            {subject_field}
            <button class="button danger" type="submit">Delete all grades</button>
        </form>
        <table>
            <thead><tr><th>Student ID</th><th>Item</th><th>Score</th><th>Updated</th><th></th></tr></thead>
            <tbody>
{record_rows}            </tbody>
        </table>
        <a class="button" href="/">Back</a>"#,
        roster_count = roster.len(),
        record_count = records.len(),
    );
    page(app_name, &format!("Dashboard: {subject}"), &body)
}

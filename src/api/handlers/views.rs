//! Minimal HTML pages. Every interpolated value goes through [`escape`].

use std::fmt::Write as _;

const STYLE: &str = "body{font-family:sans-serif;max-width:32rem;margin:3rem auto;padding:0 1rem}\
form{display:flex;flex-direction:column;gap:.5rem}\
.error{color:#b00020}.success{color:#1b5e20}";

/// Escape text for use in element content and quoted attributes.
#[must_use]
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape(title),
    )
}

fn flash(out: &mut String, error: Option<&str>, success: Option<&str>) {
    if let Some(error) = error.filter(|msg| !msg.is_empty()) {
        let _ = writeln!(out, "<p class=\"error\">{}</p>", escape(error));
    }
    if let Some(success) = success.filter(|msg| !msg.is_empty()) {
        let _ = writeln!(out, "<p class=\"success\">{}</p>", escape(success));
    }
}

#[must_use]
pub fn login_page(error: Option<&str>, success: Option<&str>) -> String {
    let mut body = String::from("<h1>Login</h1>\n");
    flash(&mut body, error, success);
    body.push_str(
        "<form method=\"post\" action=\"/login\">\n\
         <input name=\"username\" placeholder=\"Username\" required>\n\
         <input name=\"password\" type=\"password\" placeholder=\"Password\" required>\n\
         <button type=\"submit\">Login</button>\n\
         </form>\n\
         <p>No account? <a href=\"/signup\">Sign up</a></p>\n",
    );
    layout("Login", &body)
}

#[must_use]
pub fn signup_page(error: Option<&str>) -> String {
    let mut body = String::from("<h1>Sign up</h1>\n");
    flash(&mut body, error, None);
    body.push_str(
        "<form method=\"post\" action=\"/signup\">\n\
         <input name=\"username\" placeholder=\"Username\" required>\n\
         <input name=\"password\" type=\"password\" placeholder=\"Password\" required>\n\
         <input name=\"confirm_password\" type=\"password\" placeholder=\"Confirm password\" required>\n\
         <button type=\"submit\">Sign up</button>\n\
         </form>\n\
         <p>Already registered? <a href=\"/login\">Login</a></p>\n",
    );
    layout("Sign up", &body)
}

#[must_use]
pub fn dashboard_page(username: &str, prediction_url: &str) -> String {
    let body = format!(
        "<h1>Welcome, {username}</h1>\n\
         <p>Upload an image to detect objects.</p>\n\
         <form method=\"post\" action=\"{prediction_url}\" enctype=\"multipart/form-data\">\n\
         <input name=\"file\" type=\"file\" accept=\"image/*\" required>\n\
         <button type=\"submit\">Detect</button>\n\
         </form>\n\
         <p><a href=\"/logout\">Logout</a></p>\n",
        username = escape(username),
        prediction_url = escape(prediction_url),
    );
    layout("Dashboard", &body)
}

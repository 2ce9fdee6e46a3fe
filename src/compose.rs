//! Assembly of reminder email content.
//!
//! Layout is intentionally plain text-first; the HTML part mirrors the
//! text part. Both always carry the one-click unsubscribe link.

use crate::lines::GridProgress;
use crate::recommend::Recommendation;
use crate::transport::OutboundEmail;

pub fn unsubscribe_url(base_url: &str, token: &str) -> String {
    format!("{}/reminders/unsubscribe/{}", base_url.trim_end_matches('/'), token)
}

pub fn image_url(base_url: &str, token: &str) -> String {
    format!("{}/reminders/image/{}.png", base_url.trim_end_matches('/'), token)
}

pub struct CheckinEmailContext<'a> {
    pub recipient: &'a str,
    pub user_name: Option<&'a str>,
    pub card_title: &'a str,
    pub progress: GridProgress,
    pub recommendations: &'a [Recommendation],
    pub unsubscribe_url: &'a str,
    pub image_url: Option<&'a str>,
}

/// The monthly check-in: progress summary, suggested goals, optional
/// snapshot image.
pub fn checkin_email(ctx: &CheckinEmailContext<'_>) -> OutboundEmail {
    let greeting = match ctx.user_name {
        Some(name) => format!("Hi {name},"),
        None => "Hi,".to_string(),
    };

    let line_word = if ctx.progress.complete_lines == 1 {
        "bingo line"
    } else {
        "bingo lines"
    };
    let progress = format!(
        "{} of {} squares complete — {} {}.",
        ctx.progress.completed_squares,
        ctx.progress.total_squares,
        ctx.progress.complete_lines,
        line_word
    );

    let mut text = format!(
        "{greeting}\n\nTime for your check-in on \"{}\".\n\n{progress}\n",
        ctx.card_title
    );
    let mut html_body = format!(
        "<p>{greeting}</p><p>Time for your check-in on <strong>{}</strong>.</p><p>{progress}</p>",
        ctx.card_title
    );

    if let Some(url) = ctx.image_url {
        html_body.push_str(&format!("<p><img src=\"{url}\" alt=\"Card snapshot\"/></p>"));
        text.push_str(&format!("\nCard snapshot: {url}\n"));
    }

    if !ctx.recommendations.is_empty() {
        text.push_str("\nWorth a push this month:\n");
        html_body.push_str("<p>Worth a push this month:</p><ul>");
        for rec in ctx.recommendations {
            text.push_str(&format!("  - {}\n", rec.text));
            html_body.push_str(&format!("<li>{}</li>", rec.text));
        }
        html_body.push_str("</ul>");
    }

    text.push_str(&format!("\nUnsubscribe: {}\n", ctx.unsubscribe_url));
    html_body.push_str(&format!(
        "<p><a href=\"{}\">Unsubscribe from reminder emails</a></p>",
        ctx.unsubscribe_url
    ));

    OutboundEmail {
        recipient: ctx.recipient.to_string(),
        subject: format!("Check-in time: {}", ctx.card_title),
        html: wrap_html(&html_body),
        text,
    }
}

pub struct GoalEmailContext<'a> {
    pub recipient: &'a str,
    pub user_name: Option<&'a str>,
    pub card_title: &'a str,
    pub goal_text: &'a str,
    pub unsubscribe_url: &'a str,
}

/// The one-shot goal nudge.
pub fn goal_email(ctx: &GoalEmailContext<'_>) -> OutboundEmail {
    let greeting = match ctx.user_name {
        Some(name) => format!("Hi {name},"),
        None => "Hi,".to_string(),
    };

    let text = format!(
        "{greeting}\n\nA nudge you asked for, from \"{}\":\n\n  {}\n\nUnsubscribe: {}\n",
        ctx.card_title, ctx.goal_text, ctx.unsubscribe_url
    );
    let html_body = format!(
        "<p>{greeting}</p><p>A nudge you asked for, from <strong>{}</strong>:</p>\
         <blockquote>{}</blockquote>\
         <p><a href=\"{}\">Unsubscribe from reminder emails</a></p>",
        ctx.card_title, ctx.goal_text, ctx.unsubscribe_url
    );

    OutboundEmail {
        recipient: ctx.recipient.to_string(),
        subject: format!("Goal nudge: {}", truncate(ctx.goal_text, 60)),
        html: wrap_html(&html_body),
        text,
    }
}

/// The settings-page test email.
pub fn test_email(recipient: &str, user_name: Option<&str>) -> OutboundEmail {
    let greeting = match user_name {
        Some(name) => format!("Hi {name},"),
        None => "Hi,".to_string(),
    };
    let text = format!(
        "{greeting}\n\nThis is a test of your reminder email settings. \
         If you're reading it, delivery works.\n"
    );
    let html_body = format!(
        "<p>{greeting}</p><p>This is a test of your reminder email settings. \
         If you're reading it, delivery works.</p>"
    );
    OutboundEmail {
        recipient: recipient.to_string(),
        subject: "Reminder test email".to_string(),
        html: wrap_html(&html_body),
        text,
    }
}

fn wrap_html(body: &str) -> String {
    format!("<!doctype html><html><body>{body}</body></html>")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkin_email_includes_progress_and_unsubscribe() {
        let email = checkin_email(&CheckinEmailContext {
            recipient: "u@example.com",
            user_name: Some("Sam"),
            card_title: "2025 Goals",
            progress: GridProgress {
                completed_squares: 7,
                total_squares: 25,
                complete_lines: 1,
            },
            recommendations: &[],
            unsubscribe_url: "https://goalbingo.app/reminders/unsubscribe/tok",
            image_url: None,
        });
        assert!(email.text.contains("7 of 25 squares complete — 1 bingo line."));
        assert!(email.text.contains("/unsubscribe/tok"));
        assert!(email.html.contains("/unsubscribe/tok"));
        assert!(!email.html.contains("<img"));
    }

    #[test]
    fn test_checkin_email_lists_recommendations() {
        let recs = vec![crate::recommend::Recommendation {
            position: 2,
            text: "Read 12 books".to_string(),
            score: 2,
        }];
        let email = checkin_email(&CheckinEmailContext {
            recipient: "u@example.com",
            user_name: None,
            card_title: "2025 Goals",
            progress: GridProgress {
                completed_squares: 0,
                total_squares: 9,
                complete_lines: 0,
            },
            recommendations: &recs,
            unsubscribe_url: "https://x/u/t",
            image_url: Some("https://x/reminders/image/img.png"),
        });
        assert!(email.text.contains("Read 12 books"));
        assert!(email.html.contains("<img src=\"https://x/reminders/image/img.png\""));
    }

    #[test]
    fn test_goal_subject_truncated() {
        let long = "a".repeat(100);
        let email = goal_email(&GoalEmailContext {
            recipient: "u@example.com",
            user_name: None,
            card_title: "Card",
            goal_text: &long,
            unsubscribe_url: "https://x/u/t",
        });
        assert!(email.subject.chars().count() <= 72);
        assert!(email.subject.ends_with('…'));
    }

    #[test]
    fn test_url_builders_handle_trailing_slash() {
        assert_eq!(
            unsubscribe_url("https://x/", "t"),
            "https://x/reminders/unsubscribe/t"
        );
        assert_eq!(image_url("https://x", "t"), "https://x/reminders/image/t.png");
    }
}

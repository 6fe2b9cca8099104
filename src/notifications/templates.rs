use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::render::{render, render_html, Variables};

/// Registered e-mail templates, addressed by their camelCase key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateKey {
    WaitingListWelcome,
    EmailVerification,
    AccountActivated,
    OnboardingReminder,
}

impl TemplateKey {
    pub const ALL: [TemplateKey; 4] = [
        Self::WaitingListWelcome,
        Self::EmailVerification,
        Self::AccountActivated,
        Self::OnboardingReminder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WaitingListWelcome => "waitingListWelcome",
            Self::EmailVerification => "emailVerification",
            Self::AccountActivated => "accountActivated",
            Self::OnboardingReminder => "onboardingReminder",
        }
    }

    fn source(self) -> &'static TemplateSource {
        match self {
            Self::WaitingListWelcome => &WAITING_LIST_WELCOME,
            Self::EmailVerification => &EMAIL_VERIFICATION,
            Self::AccountActivated => &ACCOUNT_ACTIVATED,
            Self::OnboardingReminder => &ONBOARDING_REMINDER,
        }
    }
}

impl std::str::FromStr for TemplateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown template {s}"))
    }
}

struct TemplateSource {
    subject: &'static str,
    html: &'static str,
    text: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn render_template(key: TemplateKey, vars: &Variables) -> RenderedEmail {
    let src = key.source();
    RenderedEmail {
        subject: render(src.subject, vars),
        html: render_html(src.html, vars),
        text: render(src.text, vars),
    }
}

/// A template with its variables as named fields.
pub trait EmailTemplate {
    const KEY: TemplateKey;
    fn variables(&self) -> Variables;

    fn render(&self) -> RenderedEmail {
        render_template(Self::KEY, &self.variables())
    }
}

fn bag<const N: usize>(pairs: [(&str, &str); N]) -> Variables {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

#[derive(Debug, Clone)]
pub struct WaitingListWelcome {
    pub name: String,
    pub email: String,
}

impl EmailTemplate for WaitingListWelcome {
    const KEY: TemplateKey = TemplateKey::WaitingListWelcome;
    fn variables(&self) -> Variables {
        bag([("name", self.name.as_str()), ("email", self.email.as_str())])
    }
}

#[derive(Debug, Clone)]
pub struct EmailVerification {
    pub name: String,
    pub verify_url: String,
}

impl EmailTemplate for EmailVerification {
    const KEY: TemplateKey = TemplateKey::EmailVerification;
    fn variables(&self) -> Variables {
        bag([("name", self.name.as_str()), ("verify_url", self.verify_url.as_str())])
    }
}

#[derive(Debug, Clone)]
pub struct AccountActivated {
    pub name: String,
    pub dashboard_url: String,
}

impl EmailTemplate for AccountActivated {
    const KEY: TemplateKey = TemplateKey::AccountActivated;
    fn variables(&self) -> Variables {
        bag([("name", self.name.as_str()), ("dashboard_url", self.dashboard_url.as_str())])
    }
}

#[derive(Debug, Clone)]
pub struct OnboardingReminder {
    pub name: String,
    pub continue_url: String,
}

impl EmailTemplate for OnboardingReminder {
    const KEY: TemplateKey = TemplateKey::OnboardingReminder;
    fn variables(&self) -> Variables {
        bag([("name", self.name.as_str()), ("continue_url", self.continue_url.as_str())])
    }
}

const WAITING_LIST_WELCOME: TemplateSource = TemplateSource {
    subject: "You're on the list, {{name}}!",
    html: r#"<!DOCTYPE html>
<html>
<body style="font-family: Helvetica, Arial, sans-serif; color: #1f2933; line-height: 1.6;">
  <h2 style="font-weight: 400;">Welcome to CareerDesk, {{name}}</h2>
  <p>Thanks for completing your profile. You're now on our waiting list and we'll
     reach out at <strong>{{email}}</strong> as soon as a career coach is ready for you.</p>
  <p>In the meantime there's nothing else you need to do.</p>
  <p style="color: #7b8794; font-size: 13px;">CareerDesk</p>
</body>
</html>"#,
    text: "Welcome to CareerDesk, {{name}}\n\n\
           Thanks for completing your profile. You're now on our waiting list and we'll \
           reach out at {{email}} as soon as a career coach is ready for you.\n\n\
           CareerDesk",
};

const EMAIL_VERIFICATION: TemplateSource = TemplateSource {
    subject: "Confirm your email address",
    html: r#"<!DOCTYPE html>
<html>
<body style="font-family: Helvetica, Arial, sans-serif; color: #1f2933; line-height: 1.6;">
  <h2 style="font-weight: 400;">Hi {{name}},</h2>
  <p>Please confirm your email address to continue setting up your CareerDesk account.</p>
  <p><a href="{{verify_url}}" style="background: #3b5bdb; color: #ffffff; padding: 12px 24px; text-decoration: none;">Confirm email</a></p>
  <p style="color: #7b8794; font-size: 13px;">If you didn't sign up, you can ignore this message.</p>
</body>
</html>"#,
    text: "Hi {{name}},\n\n\
           Please confirm your email address to continue setting up your CareerDesk account:\n\
           {{verify_url}}\n\n\
           If you didn't sign up, you can ignore this message.",
};

const ACCOUNT_ACTIVATED: TemplateSource = TemplateSource {
    subject: "Your CareerDesk account is ready",
    html: r#"<!DOCTYPE html>
<html>
<body style="font-family: Helvetica, Arial, sans-serif; color: #1f2933; line-height: 1.6;">
  <h2 style="font-weight: 400;">Good news, {{name}}!</h2>
  <p>A spot has opened up and your account is now active.</p>
  <p><a href="{{dashboard_url}}" style="background: #3b5bdb; color: #ffffff; padding: 12px 24px; text-decoration: none;">Open your dashboard</a></p>
</body>
</html>"#,
    text: "Good news, {{name}}!\n\n\
           A spot has opened up and your account is now active:\n\
           {{dashboard_url}}",
};

const ONBOARDING_REMINDER: TemplateSource = TemplateSource {
    subject: "{{name}}, finish setting up your profile",
    html: r#"<!DOCTYPE html>
<html>
<body style="font-family: Helvetica, Arial, sans-serif; color: #1f2933; line-height: 1.6;">
  <h2 style="font-weight: 400;">You're almost there, {{name}}</h2>
  <p>Pick up where you left off and join the waiting list.</p>
  <p><a href="{{continue_url}}" style="background: #3b5bdb; color: #ffffff; padding: 12px 24px; text-decoration: none;">Continue</a></p>
</body>
</html>"#,
    text: "You're almost there, {{name}}\n\n\
           Pick up where you left off and join the waiting list:\n\
           {{continue_url}}",
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::render::unresolved;
    use serde_json::json;

    #[test]
    fn waiting_list_welcome_fills_the_subject() {
        let vars: Variables =
            serde_json::from_value(json!({"name": "Ada", "email": "ada@x.com"})).unwrap();
        let out = render_template(TemplateKey::WaitingListWelcome, &vars);
        assert!(!out.subject.contains("{{name}}"));
        assert!(out.subject.contains("Ada"));
        assert!(out.html.contains("ada@x.com"));
        assert!(out.text.contains("ada@x.com"));
    }

    #[test]
    fn typed_templates_leave_nothing_unresolved() {
        let rendered = [
            WaitingListWelcome { name: "Ada".into(), email: "ada@x.com".into() }.render(),
            EmailVerification { name: "Ada".into(), verify_url: "https://x/v".into() }.render(),
            AccountActivated { name: "Ada".into(), dashboard_url: "https://x/d".into() }.render(),
            OnboardingReminder { name: "Ada".into(), continue_url: "https://x/c".into() }.render(),
        ];
        for r in rendered {
            assert!(unresolved(&r.subject).is_empty(), "{}", r.subject);
            assert!(unresolved(&r.html).is_empty());
            assert!(unresolved(&r.text).is_empty());
        }
    }

    #[test]
    fn keys_parse_from_their_names() {
        for key in TemplateKey::ALL {
            assert_eq!(key.as_str().parse::<TemplateKey>().unwrap(), key);
        }
        assert!("welcome".parse::<TemplateKey>().is_err());
        assert_eq!(
            serde_json::to_value(TemplateKey::WaitingListWelcome).unwrap(),
            json!("waitingListWelcome")
        );
    }

    #[test]
    fn user_supplied_names_cannot_inject_markup() {
        let name = "<a href=\"https://evil.example\">Click</a>";
        let out = EmailVerification { name: name.into(), verify_url: "https://x/v?token=a&b".into() }.render();
        assert!(!out.html.contains("<a href=\"https://evil.example\">"));
        assert!(out.html.contains("&lt;a href=&quot;https://evil.example&quot;&gt;"));
        assert!(out.html.contains("https://x/v?token=a&amp;b"));
        assert!(out.text.contains(name));
    }
}

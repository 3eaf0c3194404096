//! Server-rendered pages. Every dynamic string goes through `html_escape`;
//! chapter bodies are trusted fragments compiled into the binary.

use crate::client::auth::{Contact, HardwareExperience, PrimaryInterest, ProgrammingExperience};
use crate::models::{ChapterEntry, ChapterLink, UserProfile};
use crate::services::registry::{self, FIRST_CHAPTER};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

const SITE_TITLE: &str = "Physical AI & Humanoid Robotics";

fn layout(title: &str, active_slug: Option<&str>, viewer: Option<&UserProfile>, main: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <link rel="stylesheet" href="/static/site.css">
</head>
<body>
{header}
<div class="page">
{sidebar}
<main>
{main}
</main>
</div>
<footer>
    <p>{site} Textbook - Panaversity</p>
</footer>
</body>
</html>
"#,
        title = text(title),
        header = header(viewer),
        sidebar = sidebar(active_slug),
        site = text(SITE_TITLE),
    )
}

fn header(viewer: Option<&UserProfile>) -> String {
    let account = match viewer {
        Some(user) => format!(
            r#"<span class="user">{}</span>
        <form class="sign-out" method="post" action="/signout"><button type="submit">Sign Out</button></form>"#,
            text(&user.name)
        ),
        None => r#"<a class="button" href="/signup">Sign In</a>"#.to_string(),
    };
    format!(
        r#"<header class="site-header">
    <a class="brand" href="/"><span class="logo">PA</span> {site}</a>
    <nav>
        <a href="/">Home</a>
        <a href="/chapters/{first}">Start Learning</a>
        {account}
    </nav>
</header>"#,
        site = text(SITE_TITLE),
        first = FIRST_CHAPTER,
    )
}

fn sidebar(active_slug: Option<&str>) -> String {
    let mut html = String::from("<aside class=\"sidebar\">\n");
    for module in registry::modules() {
        html.push_str(&format!(
            "    <section>\n        <h3>Module {}: {}</h3>\n        <ul>\n",
            module.number,
            text(module.subtitle)
        ));
        for slug in module.chapters {
            let Some(entry) = registry::resolve(slug) else {
                continue;
            };
            let class = if Some(entry.slug) == active_slug {
                " class=\"active\""
            } else {
                ""
            };
            html.push_str(&format!(
                "            <li{class}><a href=\"/chapters/{}\">{} {}</a></li>\n",
                attr(entry.slug),
                entry.chapter_id,
                text(entry.title)
            ));
        }
        html.push_str("        </ul>\n    </section>\n");
    }
    html.push_str("</aside>");
    html
}

pub fn home(viewer: Option<&UserProfile>) -> String {
    let mut modules = String::new();
    for module in registry::modules() {
        modules.push_str(&format!(
            r#"    <a class="module-card" href="/chapters/{first}">
        <span class="module-number">Module {number}</span>
        <span class="chapter-count">{count} chapters</span>
        <h3>{title}</h3>
        <p class="subtitle">{subtitle}</p>
        <p>{description}</p>
    </a>
"#,
            first = module.chapters.first().copied().unwrap_or(FIRST_CHAPTER),
            number = module.number,
            count = module.chapters.len(),
            title = text(module.title),
            subtitle = text(module.subtitle),
            description = text(module.description),
        ));
    }

    let main = format!(
        r##"<section class="hero">
    <p class="badge">Panaversity AI-Native Textbook</p>
    <h1>{site}</h1>
    <p>Master the future of robotics with ROS 2, Gazebo, NVIDIA Isaac, and Vision-Language-Action models. An interactive textbook with AI-powered learning assistance.</p>
    <a class="button" href="/chapters/{first}">Start Learning</a>
    <a class="button secondary" href="#modules">View Curriculum</a>
</section>
<section id="modules">
    <h2>Course Modules</h2>
{modules}</section>"##,
        site = text(SITE_TITLE),
        first = FIRST_CHAPTER,
    );
    layout(SITE_TITLE, None, viewer, &main)
}

fn nav_link(link: Option<ChapterLink>, direction: &str) -> String {
    match link {
        Some(link) => format!(
            r#"<a class="{direction}" href="/chapters/{}">{}</a>"#,
            attr(link.slug),
            text(link.title)
        ),
        None => format!(r#"<span class="{direction}"></span>"#),
    }
}

pub fn chapter(entry: &ChapterEntry, viewer: Option<&UserProfile>) -> String {
    let module_title = registry::module(entry.module_id)
        .map(|m| m.title)
        .unwrap_or_default();
    let main = format!(
        r#"<article class="chapter" data-chapter-id="{id}">
    <p class="breadcrumb">Module {module} / {id} <span>{module_title}</span></p>
    <h1>{title}</h1>
    <div class="chapter-body">
{body}
    </div>
    <nav class="chapter-nav">
        {prev}
        {next}
    </nav>
</article>"#,
        id = text(entry.chapter_id),
        module = entry.module_id,
        module_title = text(module_title),
        title = text(entry.title),
        body = entry.body,
        prev = nav_link(entry.prev, "prev"),
        next = nav_link(entry.next, "next"),
    );
    layout(
        &format!("{} | {}", entry.title, SITE_TITLE),
        Some(entry.slug),
        viewer,
        &main,
    )
}

pub fn not_found(viewer: Option<&UserProfile>) -> String {
    let main = format!(
        r#"<section class="not-found">
    <h1>Page not found</h1>
    <p>The page you are looking for does not exist.</p>
    <a class="button" href="/chapters/{FIRST_CHAPTER}">Back to the first chapter</a>
</section>"#
    );
    layout("Not found", None, viewer, &main)
}

/// What the signup page shows.
pub enum SignupPage<'a> {
    Account {
        name: &'a str,
        email: &'a str,
        error: Option<&'a str>,
    },
    /// Carries name and email forward; the password is asked for here and
    /// never written back into the page.
    Background {
        contact: &'a Contact,
        error: Option<&'a str>,
    },
    Done {
        name: &'a str,
    },
}

fn radios(name: &str, options: impl Iterator<Item = (&'static str, &'static str, &'static str)>) -> String {
    options
        .map(|(value, label, description)| {
            format!(
                r#"        <label class="choice"><input type="radio" name="{name}" value="{value}" required> <strong>{}</strong> <small>{}</small></label>
"#,
                text(label),
                text(description)
            )
        })
        .collect()
}

pub fn signup(page: &SignupPage<'_>, viewer: Option<&UserProfile>) -> String {
    let (step, error, form) = match page {
        SignupPage::Account { name, email, error } => (
            1,
            *error,
            format!(
                r#"<form method="post" action="/signup">
    <input type="hidden" name="step" value="1">
    <label>Full Name <input type="text" name="name" value="{}" placeholder="John Doe" required></label>
    <label>Email Address <input type="email" name="email" value="{}" placeholder="you@example.com" required></label>
    <button type="submit">Continue</button>
</form>"#,
                attr(name),
                attr(email)
            ),
        ),
        SignupPage::Background { contact, error } => {
            let interests: String = PrimaryInterest::ALL
                .iter()
                .map(|choice| {
                    format!(
                        "        <option value=\"{}\">{}</option>\n",
                        choice.as_str(),
                        text(choice.label())
                    )
                })
                .collect();
            (
                2,
                *error,
                format!(
                    r#"<form method="post" action="/signup">
    <input type="hidden" name="step" value="2">
    <input type="hidden" name="name" value="{name}">
    <input type="hidden" name="email" value="{email}">
    <label>Password <input type="password" name="password" placeholder="Create a password" minlength="8" autocomplete="new-password" required></label>
    <fieldset>
        <legend>Programming Experience</legend>
{programming}    </fieldset>
    <fieldset>
        <legend>Hardware/Robotics Experience</legend>
{hardware}    </fieldset>
    <label>Primary Interest
    <select name="primary_interest" required>
        <option value="">Select your main interest</option>
{interests}    </select>
    </label>
    <button type="submit" name="back" value="1" formnovalidate>Back</button>
    <button type="submit">Create Account</button>
</form>"#,
                    name = attr(&contact.name),
                    email = attr(&contact.email),
                    programming = radios(
                        "programming_experience",
                        ProgrammingExperience::ALL
                            .iter()
                            .map(|c| (c.as_str(), c.label(), c.description())),
                    ),
                    hardware = radios(
                        "hardware_experience",
                        HardwareExperience::ALL
                            .iter()
                            .map(|c| (c.as_str(), c.label(), c.description())),
                    ),
                ),
            )
        }
        SignupPage::Done { name } => (
            2,
            None,
            format!(
                r#"<p class="success">Welcome, {}! Your account is ready.</p>
<a class="button" href="/chapters/{FIRST_CHAPTER}">Start Learning</a>"#,
                text(name)
            ),
        ),
    };

    let intro = if step == 1 {
        "Join us to start your Physical AI journey"
    } else {
        "Help us personalize your learning experience"
    };
    let error = error
        .map(|message| format!("<div class=\"error\">{}</div>\n", text(message)))
        .unwrap_or_default();
    let main = format!(
        r#"<section class="signup">
    <h1>Create Account</h1>
    <p>{intro}</p>
    <div class="steps"><span class="done"></span><span class="{second}"></span></div>
{error}{form}
</section>"#,
        second = if step >= 2 { "done" } else { "" },
    );
    layout("Create Account", None, viewer, &main)
}

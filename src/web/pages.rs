// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTML pages

use axum::{
    extract::{Path, Query, State},
    response::Html,
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use super::editor::{save_joke, EditRequest, SaveStatus};
use super::AppState;
use crate::models::{join_categories, split_categories, ActiveInd, Joke};
use crate::repository::ALL_CATEGORIES;

// === Page Handlers ===

pub(crate) async fn index_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let joke = state.repo.get_random_joke();
    let image = state.images.find(joke.joke_id);
    Html(render_index(&joke, image.as_deref()))
}

#[derive(Deserialize)]
pub(crate) struct SearchForm {
    q: Option<String>,
    category: Option<String>,
}

pub(crate) async fn search_page(
    State(state): State<Arc<AppState>>,
    Query(form): Query<SearchForm>,
) -> Html<String> {
    let mut error = None;
    let categories = match state.repo.get_joke_categories() {
        Ok(categories) => categories,
        Err(e) => {
            warn!("Category lookup failed: {}", e);
            error = Some(format!("Could not load categories: {}", e));
            Vec::new()
        }
    };
    let submitted = form.q.is_some() || form.category.is_some();
    let q = form.q.unwrap_or_default();
    let category = form.category.unwrap_or_else(|| ALL_CATEGORIES.to_string());
    let mut results = None;
    if submitted {
        match state.repo.search_jokes(&q, &category) {
            Ok(jokes) => results = Some(jokes),
            Err(e) => {
                warn!("Search failed: {}", e);
                error = Some(format!("Search failed: {}", e));
            }
        }
    }
    Html(render_search(&q, &category, &categories, results.as_deref(), error.as_deref()))
}

pub(crate) async fn joke_page(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Html<String> {
    let joke = state.repo.get_one(id);
    let image = state.images.find(joke.joke_id);
    let content = format!(
        r#"
        <h1>Joke #{}</h1>
        {}
        <p><a href="/editor/{}">Edit this joke</a></p>
    "#,
        joke.joke_id,
        render_joke_card(&joke, image.as_deref()),
        joke.joke_id
    );
    Html(base_template("Joke", &content))
}

/// Form fields posted by the editor page
#[derive(Debug, Default, Deserialize)]
pub(crate) struct EditorForm {
    #[serde(default)]
    joke_txt: String,
    #[serde(default)]
    attribution: String,
    #[serde(default)]
    image_txt: String,
    /// Comma-separated category names
    #[serde(default)]
    categories: String,
    active: Option<String>,
    #[serde(default)]
    sort_order_nbr: String,
}

impl EditorForm {
    /// Resolve category names to ids, creating unknown names.
    ///
    /// Call only once the target joke is known to exist.
    fn into_request(self, state: &AppState) -> EditRequest {
        let mut category_ids = Vec::new();
        if !self.joke_txt.trim().is_empty() {
            for name in split_categories(&self.categories) {
                match state.repo.add_category(&name, &state.user_name) {
                    Ok(category) => category_ids.push(category.joke_category_id),
                    Err(e) => tracing::warn!("Category {} not resolved: {}", name, e),
                }
            }
        }
        EditRequest {
            joke_txt: self.joke_txt,
            attribution: Some(self.attribution),
            image_txt: Some(self.image_txt),
            active_ind: Some(if self.active.is_some() {
                ActiveInd::Active
            } else {
                ActiveInd::Inactive
            }),
            sort_order_nbr: self.sort_order_nbr.trim().parse().ok(),
            category_ids,
        }
    }
}

pub(crate) async fn editor_list_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_editor_list(&state, None, &Joke::new("")))
}

pub(crate) async fn editor_create(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EditorForm>,
) -> Html<String> {
    let draft = Joke::new(form.joke_txt.clone())
        .with_attribution(form.attribution.clone())
        .with_categories(form.categories.clone());
    let request = form.into_request(&state);
    let status = save_joke(state.repo.as_ref(), None, &request, &state.user_name);
    // keep the draft on screen when the save failed
    let draft = if status.success { Joke::new("") } else { draft };
    Html(render_editor_list(&state, Some(&status), &draft))
}

pub(crate) async fn editor_page(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Html<String> {
    let joke = state.repo.get_one(id);
    Html(render_editor(&joke, None))
}

pub(crate) async fn editor_save(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Form(form): Form<EditorForm>,
) -> Html<String> {
    let existing = state.repo.get_one(id);
    if existing.is_sentinel() {
        return Html(render_editor(&existing, None));
    }
    let request = form.into_request(&state);
    let status = save_joke(state.repo.as_ref(), Some(id), &request, &state.user_name);
    let joke = state.repo.get_one(id);
    Html(render_editor(&joke, Some(&status)))
}

pub(crate) async fn export_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let counts = state
        .repo
        .list_all(ActiveInd::Active)
        .and_then(|jokes| Ok((jokes.len(), state.repo.get_joke_categories()?.len())));
    let (jokes, categories) = match counts {
        Ok(counts) => counts,
        Err(e) => {
            warn!("Export page lookup failed: {}", e);
            let content = format!("<h1>Export</h1>{}", render_error(&format!("Joke store unavailable: {}", e)));
            return Html(base_template("Export", &content));
        }
    };
    let content = format!(
        r#"
        <h1>Export</h1>
        <div class="card">
            <p>Download a SQL Server script that loads the {} active jokes and {} categories into another DadABase.</p>
            <p>Set <code>@RemovePreviousJokes</code> to 1 in the script to wipe the target first.</p>
            <p><a class="button" href="/api/export/sql">Download SQL script</a></p>
        </div>
    "#,
        jokes, categories
    );
    Html(base_template("Export", &content))
}

// === Template Rendering ===

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn base_template(title: &str, content: &str) -> String {
    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} - DadABase</title>
    <style>
        :root {{
            --bg-primary: #fdf6e3;
            --bg-card: #ffffff;
            --text-primary: #2d2a26;
            --text-secondary: #6b645a;
            --accent: #d9480f;
            --border: #e6dccb;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
        }}
        .container {{ max-width: 960px; margin: 0 auto; padding: 20px; }}
        nav {{
            background: var(--bg-card);
            padding: 15px 20px;
            display: flex;
            align-items: center;
            gap: 30px;
            border-bottom: 1px solid var(--border);
        }}
        nav .logo {{ font-size: 1.5em; font-weight: bold; color: var(--accent); text-decoration: none; }}
        nav a {{ color: var(--text-secondary); text-decoration: none; }}
        nav a:hover {{ color: var(--text-primary); }}
        h1 {{ margin-bottom: 15px; }}
        .card {{
            background: var(--bg-card);
            border: 1px solid var(--border);
            border-radius: 12px;
            padding: 20px;
            margin-bottom: 20px;
        }}
        .joke {{ font-size: 1.4em; }}
        .attribution {{ color: var(--text-secondary); font-style: italic; }}
        .category-badge {{
            display: inline-block;
            border: 1px solid var(--border);
            padding: 2px 10px;
            border-radius: 6px;
            font-size: 0.85em;
            margin: 2px;
        }}
        .joke-image {{ max-width: 100%; border-radius: 8px; margin-top: 15px; }}
        table {{ width: 100%; border-collapse: collapse; }}
        th, td {{ padding: 10px; text-align: left; border-bottom: 1px solid var(--border); }}
        label {{ display: block; margin-top: 10px; color: var(--text-secondary); }}
        input[type=text], textarea, select {{ width: 100%; padding: 8px; border: 1px solid var(--border); border-radius: 6px; }}
        .button, button {{
            display: inline-block;
            margin-top: 15px;
            background: var(--accent);
            color: white;
            border: none;
            padding: 8px 16px;
            border-radius: 6px;
            text-decoration: none;
            cursor: pointer;
        }}
        .alert {{ padding: 10px 15px; border-radius: 6px; margin-bottom: 15px; }}
        .alert-success {{ background: #d3f9d8; }}
        .alert-warning {{ background: #fff3bf; }}
        .alert-danger {{ background: #ffe3e3; }}
    </style>
</head>
<body>
    <nav>
        <a href="/" class="logo">DadABase</a>
        <a href="/">Random</a>
        <a href="/search">Search</a>
        <a href="/editor">Editor</a>
        <a href="/export">Export</a>
    </nav>
    <main class="container">
        {}
    </main>
</body>
</html>"#, escape_html(title), content)
}

fn render_joke_card(joke: &Joke, image_url: Option<&str>) -> String {
    let text = escape_html(&joke_body(joke)).replace('\n', "<br>");
    let attribution = joke
        .attribution
        .as_deref()
        .filter(|a| !a.is_empty())
        .map(|a| format!(r#"<p class="attribution">- {}</p>"#, escape_html(a)))
        .unwrap_or_default();
    let badges: String = joke
        .category_list()
        .iter()
        .map(|c| format!(r#"<span class="category-badge">{}</span>"#, escape_html(c)))
        .collect();
    let image = image_url
        .map(|url| format!(r#"<img class="joke-image" src="{}" alt="Joke illustration">"#, escape_html(url)))
        .unwrap_or_default();

    format!(
        r#"
        <div class="card">
            <p class="joke">{}</p>
            {}
            <div>{}</div>
            {}
        </div>
    "#,
        text, attribution, badges, image
    )
}

/// Joke text as displayed, without the trailing attribution
fn joke_body(joke: &Joke) -> String {
    let mut bare = joke.clone();
    bare.attribution = None;
    bare.to_string()
}

fn render_index(joke: &Joke, image_url: Option<&str>) -> String {
    let content = format!(
        r#"
        <h1>Random Dad Joke</h1>
        {}
        <a class="button" href="/">Tell me another one!</a>
    "#,
        render_joke_card(joke, image_url)
    );
    base_template("Random Joke", &content)
}

fn render_error(message: &str) -> String {
    format!(r#"<div class="alert alert-danger">{}</div>"#, escape_html(message))
}

fn render_search(
    q: &str,
    category: &str,
    categories: &[String],
    results: Option<&[Joke]>,
    error: Option<&str>,
) -> String {
    let options: String = std::iter::once(ALL_CATEGORIES.to_string())
        .chain(categories.iter().cloned())
        .map(|c| {
            let selected = if c.eq_ignore_ascii_case(category) { " selected" } else { "" };
            format!(r#"<option value="{0}"{1}>{0}</option>"#, escape_html(&c), selected)
        })
        .collect();

    let results_html = match results {
        None => error.map(render_error).unwrap_or_default(),
        Some([]) => r#"<div class="card"><p>No matching jokes found.</p></div>"#.to_string(),
        Some(jokes) => {
            let cards: String = jokes.iter().map(|j| render_joke_card(j, None)).collect();
            format!("<p>{} joke(s) found</p>{}", jokes.len(), cards)
        }
    };

    let content = format!(
        r#"
        <h1>Search</h1>
        <form class="card" method="get" action="/search">
            <label for="q">Search text</label>
            <input type="text" id="q" name="q" value="{}" autofocus>
            <label for="category">Category</label>
            <select id="category" name="category">{}</select>
            <button type="submit">Search</button>
        </form>
        {}
    "#,
        escape_html(q),
        options,
        results_html
    );
    base_template("Search", &content)
}

fn render_status(status: Option<&SaveStatus>) -> String {
    status
        .map(|s| {
            format!(
                r#"<div class="alert {}">{}</div>"#,
                s.level.css_class(),
                escape_html(&s.message)
            )
        })
        .unwrap_or_default()
}

fn render_form(action: &str, joke: &Joke) -> String {
    let checked = if joke.active_ind.is_active() { " checked" } else { "" };
    format!(
        r#"
        <form class="card" method="post" action="{}">
            <label for="joke_txt">Joke</label>
            <textarea id="joke_txt" name="joke_txt" rows="4">{}</textarea>
            <label for="attribution">Attribution</label>
            <input type="text" id="attribution" name="attribution" value="{}">
            <label for="categories">Categories (comma separated)</label>
            <input type="text" id="categories" name="categories" value="{}">
            <label for="image_txt">Image description</label>
            <textarea id="image_txt" name="image_txt" rows="3">{}</textarea>
            <label for="sort_order_nbr">Sort order</label>
            <input type="text" id="sort_order_nbr" name="sort_order_nbr" value="{}">
            <label><input type="checkbox" name="active"{}> Active</label>
            <button type="submit">Save</button>
        </form>
    "#,
        action,
        escape_html(&joke.joke_txt),
        escape_html(joke.attribution.as_deref().unwrap_or_default()),
        escape_html(&joke.categories),
        escape_html(joke.image_txt.as_deref().unwrap_or_default()),
        joke.sort_order_nbr,
        checked
    )
}

fn render_editor(joke: &Joke, status: Option<&SaveStatus>) -> String {
    if joke.is_sentinel() {
        let content = format!(
            r#"<h1>Edit Joke</h1><div class="card"><p>{}</p></div>"#,
            escape_html(&joke.joke_txt)
        );
        return base_template("Edit Joke", &content);
    }
    let content = format!(
        r#"
        <h1>Edit Joke #{}</h1>
        {}
        {}
        <p><a href="/jokes/{}">View</a> | <a href="/editor">Back to list</a></p>
    "#,
        joke.joke_id,
        render_status(status),
        render_form(&format!("/editor/{}", joke.joke_id), joke),
        joke.joke_id
    );
    base_template("Edit Joke", &content)
}

fn render_editor_list(state: &AppState, status: Option<&SaveStatus>, draft: &Joke) -> String {
    let listed = state
        .repo
        .list_all(ActiveInd::Active)
        .and_then(|mut jokes| {
            jokes.extend(state.repo.list_all(ActiveInd::Inactive)?);
            Ok(jokes)
        });
    let (mut jokes, load_error) = match listed {
        Ok(jokes) => (jokes, String::new()),
        Err(e) => {
            warn!("Editor listing failed: {}", e);
            (Vec::new(), render_error(&format!("Could not load jokes: {}", e)))
        }
    };
    jokes.sort_by_key(|j| j.joke_id);

    let rows: String = jokes
        .iter()
        .map(|j| {
            format!(
                r#"<tr><td><a href="/editor/{0}">{0}</a></td><td>{1}</td><td>{2}</td><td>{3}</td></tr>"#,
                j.joke_id,
                escape_html(&j.joke_txt),
                escape_html(&join_categories(j.category_list())),
                j.active_ind.as_str()
            )
        })
        .collect();

    let content = format!(
        r#"
        <h1>Joke Editor</h1>
        {}
        {}
        <h2>Add a joke</h2>
        {}
        <div class="card">
            <table>
                <tr><th>Id</th><th>Joke</th><th>Categories</th><th>Active</th></tr>
                {}
            </table>
        </div>
    "#,
        render_status(status),
        load_error,
        render_form("/editor", draft),
        rows
    );
    base_template("Editor", &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_joke_card_knock_knock() {
        let joke = Joke::new("KK/WT: Boo? Don't cry, it's only a joke!").with_attribution("<Kid>");
        let html = render_joke_card(&joke, Some("/images/3.png"));
        assert!(html.contains("Knock Knock!<br>"));
        assert!(html.contains("Boo who?"));
        assert!(html.contains("- &lt;Kid&gt;"));
        assert!(html.contains(r#"src="/images/3.png""#));
    }

    #[test]
    fn test_search_marks_selected_category() {
        let html = render_search("", "puns", &["Animals".to_string(), "Puns".to_string()], None, None);
        assert!(html.contains(r#"<option value="Puns" selected>"#));
        assert!(!html.contains("joke(s) found"));
        assert!(!html.contains("alert-danger"));
    }

    #[test]
    fn test_search_shows_failure_inline() {
        let html = render_search("cow", "All", &[], None, Some("Search failed: <locked>"));
        assert!(html.contains(r#"<div class="alert alert-danger">Search failed: &lt;locked&gt;</div>"#));
        assert!(!html.contains("No matching jokes found."));
    }
}

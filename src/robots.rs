//! `robots.txt` fetching and rule evaluation.
//!
//! Rule selection uses longest-matching-prefix, with ties between an `Allow`
//! and a `Disallow` of the same length broken in favor of `Allow` — the
//! modern (Google-style) interpretation, rather than the first-match-wins
//! order the stdlib parser this was ported from used.

use crate::http::HttpWorker;

#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    base_url: String,
    user_agent: String,
    loaded: bool,
    raw_text: String,
    groups: Vec<Group>,
}

#[derive(Debug, Clone)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

#[derive(Debug, Clone)]
struct Rule {
    prefix: String,
    allow: bool,
}

impl RobotsPolicy {
    #[must_use]
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            loaded: false,
            raw_text: String::new(),
            groups: Vec::new(),
        }
    }

    /// Fetches `robots.txt` from the base URL and parses it. Returns
    /// `(fetched, raw_text)`: `fetched` is `false` (and everything is
    /// implicitly allowed) when the request fails or returns a non-2xx
    /// status, matching "no robots.txt = everything allowed".
    ///
    /// # Errors
    /// Returns an error only if the underlying HTTP worker itself errors
    /// (not for a missing/failed fetch, which is a normal outcome here).
    pub async fn load(&mut self, http: &HttpWorker) -> crate::error::Result<(bool, String)> {
        let url = format!("{}/robots.txt", self.base_url);
        let response = http.get(&url).await?;
        if response.ok() {
            self.raw_text = response.body.clone();
            self.groups = parse(&response.body);
            self.loaded = true;
            Ok((true, response.body))
        } else {
            self.raw_text = String::new();
            self.groups = Vec::new();
            self.loaded = true;
            Ok((false, String::new()))
        }
    }

    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether `path` is allowed for the configured user agent. Everything
    /// is allowed until [`Self::load`] has run.
    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        if !self.loaded {
            return true;
        }
        let Some(group) = self.matching_group() else {
            return true;
        };
        let mut best: Option<&Rule> = None;
        for rule in &group.rules {
            if path.starts_with(&rule.prefix)
                && best.is_none_or(|b| rule.prefix.len() > b.prefix.len() || (rule.prefix.len() == b.prefix.len() && rule.allow))
            {
                best = Some(rule);
            }
        }
        best.map_or(true, |rule| rule.allow)
    }

    /// Crawl-delay in seconds for the configured user agent, if declared.
    #[must_use]
    pub fn crawl_delay(&self) -> Option<f64> {
        self.matching_group().and_then(|g| g.crawl_delay)
    }

    fn matching_group(&self) -> Option<&Group> {
        let ua = self.user_agent.to_lowercase();
        let ua_token = ua.split('/').next().unwrap_or(&ua);
        self.groups
            .iter()
            .find(|g| {
                g.agents
                    .iter()
                    .any(|a| a != "*" && ua_token.contains(a.as_str()))
            })
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
    }
}

/// Parses the group/rule structure of a `robots.txt` document. Each block of
/// consecutive `User-agent` lines starts a new group; `Disallow`/`Allow`/
/// `Crawl-delay` lines attach to the most recently started group.
fn parse(text: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut current_agents: Vec<String> = Vec::new();
    let mut started_rules = false;

    for raw_line in text.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((directive, value)) = line.split_once(':') else {
            continue;
        };
        let directive = directive.trim().to_lowercase();
        let value = value.trim();

        match directive.as_str() {
            "user-agent" => {
                if started_rules {
                    current_agents.clear();
                    started_rules = false;
                }
                current_agents.push(value.to_lowercase());
            }
            "disallow" if !current_agents.is_empty() => {
                started_rules = true;
                ensure_group(&mut groups, &current_agents).rules.push(Rule {
                    prefix: value.to_string(),
                    allow: value.is_empty(),
                });
            }
            "allow" if !current_agents.is_empty() => {
                started_rules = true;
                ensure_group(&mut groups, &current_agents).rules.push(Rule {
                    prefix: value.to_string(),
                    allow: true,
                });
            }
            "crawl-delay" if !current_agents.is_empty() => {
                started_rules = true;
                if let Ok(delay) = value.parse::<f64>() {
                    ensure_group(&mut groups, &current_agents).crawl_delay = Some(delay);
                }
            }
            _ => {}
        }
    }
    groups
}

fn ensure_group<'a>(groups: &'a mut Vec<Group>, agents: &[String]) -> &'a mut Group {
    if let Some(idx) = groups.iter().position(|g| g.agents == agents) {
        return &mut groups[idx];
    }
    groups.push(Group {
        agents: agents.to_vec(),
        rules: Vec::new(),
        crawl_delay: None,
    });
    groups.last_mut().expect("just pushed")
}

//! Crew definitions: prompts for each pipeline stage.
//!
//! Built-in definitions cover every stage; files in a crews directory
//! override them by id. Files are YAML:
//!
//! ```yaml
//! id: critique
//! name: "Editorial Critic"
//! description: "Judges whether a story is worth researching"
//! system_prompt: |
//!   You are a senior news editor...
//! prompt_template: |
//!   Story: ${news_title}
//!   ...
//! ```
//!
//! or Markdown with YAML frontmatter, where the body is the prompt template.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

pub const DISCOVER: &str = "discover";
pub const SCRAPE: &str = "scrape";
pub const CRITIQUE: &str = "critique";
pub const PLANNING: &str = "planning";
pub const RESEARCH: &str = "research";
pub const COUNTER_ARGS: &str = "counter_args";
pub const WRITER: &str = "writer";

/// Pipeline order, used for listing.
pub const CREW_ORDER: [&str; 7] = [DISCOVER, SCRAPE, CRITIQUE, PLANNING, RESEARCH, COUNTER_ARGS, WRITER];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewDef {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub system_prompt: String,

    /// User prompt with `${var}` placeholders.
    pub prompt_template: String,

    /// Overrides the configured model chain for this crew.
    #[serde(default)]
    pub models: Option<Vec<String>>,
}

impl CrewDef {
    pub fn from_yaml(yaml: &str) -> Result<Self, FlowError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| FlowError::Configuration(format!("Failed to parse crew YAML: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, FlowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Configuration(format!("Failed to read crew file '{}': {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Markdown with YAML frontmatter; the id defaults to the file stem.
    pub fn from_markdown(path: &Path) -> Result<Self, FlowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Configuration(format!("Failed to read crew markdown '{}': {}", path.display(), e))
        })?;

        let parts: Vec<&str> = content.splitn(3, "---").collect();
        if parts.len() < 3 {
            return Err(FlowError::Configuration(format!(
                "Invalid crew markdown '{}': missing YAML frontmatter",
                path.display()
            )));
        }

        #[derive(Deserialize)]
        struct FrontMatter {
            id: Option<String>,
            name: String,
            description: Option<String>,
            #[serde(default)]
            system_prompt: String,
            models: Option<Vec<String>>,
        }

        let fm: FrontMatter = serde_yaml::from_str(parts[1].trim()).map_err(|e| {
            FlowError::Configuration(format!(
                "Failed to parse frontmatter in '{}': {}",
                path.display(),
                e
            ))
        })?;

        let id = fm.id.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        });

        Ok(Self {
            id,
            name: fm.name,
            description: fm.description,
            system_prompt: fm.system_prompt,
            prompt_template: parts[2].trim().to_string(),
            models: fm.models,
        })
    }

    /// Fill `${var}` placeholders. Unknown placeholders are left as written.
    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        render_template(&self.prompt_template, vars)
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"))
}

pub fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &regex::Captures| {
            vars.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

/// Crew definitions indexed by id.
#[derive(Debug, Clone)]
pub struct CrewCatalog {
    crews: HashMap<String, CrewDef>,
}

impl Default for CrewCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CrewCatalog {
    pub fn builtin() -> Self {
        Self {
            crews: builtin_crews()
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
        }
    }

    /// Built-ins overridden by whatever `dir` contains.
    pub fn with_dir(dir: Option<&str>) -> Result<Self, FlowError> {
        let mut catalog = Self::builtin();
        if let Some(dir) = dir {
            let n = catalog.load_dir(Path::new(dir))?;
            tracing::info!("[CrewCatalog] Loaded {} crew definitions from '{}'", n, dir);
        }
        Ok(catalog)
    }

    /// Load `.yaml`/`.yml`/`.md` definitions, replacing crews with the same id.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, FlowError> {
        if !dir.is_dir() {
            return Err(FlowError::Configuration(format!(
                "Crew directory '{}' does not exist",
                dir.display()
            )));
        }

        let mut count = 0;
        let entries = std::fs::read_dir(dir).map_err(|e| {
            FlowError::Configuration(format!("Failed to read directory '{}': {}", dir.display(), e))
        })?;
        for entry in entries {
            let path = entry
                .map_err(|e| FlowError::Configuration(format!("Directory entry error: {}", e)))?
                .path();
            let crew = match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
                "yaml" | "yml" => CrewDef::from_file(&path)?,
                "md" => CrewDef::from_markdown(&path)?,
                _ => continue,
            };
            tracing::info!("[CrewCatalog] Loaded crew: {} ({})", crew.id, crew.name);
            self.crews.insert(crew.id.clone(), crew);
            count += 1;
        }
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Option<&CrewDef> {
        self.crews.get(id)
    }

    /// Pipeline crews first, in order, then any extra ids alphabetically.
    pub fn all(&self) -> Vec<&CrewDef> {
        let mut crews: Vec<&CrewDef> = self.crews.values().collect();
        crews.sort_by_key(|c| {
            let pos = CREW_ORDER.iter().position(|id| *id == c.id).unwrap_or(CREW_ORDER.len());
            (pos, c.id.clone())
        });
        crews
    }
}

const JSON_ONLY: &str = "Respond with a single JSON document and nothing else.";

fn crew(id: &str, name: &str, description: &str, system_prompt: &str, template: &str) -> CrewDef {
    CrewDef {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        system_prompt: format!("{}\n{}", system_prompt, JSON_ONLY),
        prompt_template: template.to_string(),
        models: None,
    }
}

/// Hardcoded definitions used when no override is present.
pub fn builtin_crews() -> Vec<CrewDef> {
    let mut crews = vec![
        crew(
            DISCOVER,
            "News Scout",
            "Finds recent stories on a topic",
            "You are a news scout. Find recent, verifiable stories with working source links.",
            "Find ${num_starting_news} recent news stories about: ${topic}\n\
             As of ${current_date}, keep the ${num_max_news} most relevant to this perspective: ${perspective}\n\
             Return {\"news_list\": [{\"news_title\", \"summary\", \"source_url\", \"content\"}]}.",
        ),
        crew(
            SCRAPE,
            "News Scraper",
            "Extracts stories from given URLs",
            "You are a news scraper. Extract the original article content faithfully.",
            "Extract the news stories published at these URLs:\n${news_urls}\n\
             Keep at most ${num_max_news}. As of ${current_date}; perspective: ${perspective}\n\
             Return {\"news_list\": [{\"news_title\", \"summary\", \"source_url\", \"content\"}]}.",
        ),
        crew(
            CRITIQUE,
            "Editorial Critic",
            "Judges whether a story is worth researching",
            "You are a senior news editor. Judge newsworthiness, sourcing and fit.",
            "Story: ${news_title}\nSource: ${source_url}\nSummary: ${summary}\n\
             Content:\n${content}\n\nEditorial perspective: ${perspective}\n\
             Return {\"news_title\", \"approved\": bool, \"rationale\", \"concerns\": [string]}.",
        ),
        crew(
            PLANNING,
            "Research Planner",
            "Extracts key ideas, datapoints and counter-arguments",
            "You are a research planner for long-form journalism.",
            "Story: ${news_title}\nSource: ${source_url}\nSummary: ${summary}\n\
             Content:\n${content}\n\nTopic: ${topic}\nPerspective: ${perspective}\n\
             Return {\"news_title\", \"source_url\", \
             \"key_ideas\": {\"ideas\": [{\"key_idea\", \"rationale\"}]}, \
             \"key_datapoints\": {\"datapoints\": [{\"datapoint\", \"rationale\"}]}, \
             \"counter_arguments\": {\"counter_arguments\": [{\"counter_argument\", \"rationale\"}]}}.",
        ),
        crew(
            RESEARCH,
            "Evidence Researcher",
            "Finds evidence supporting one key idea",
            "You are an evidence researcher. Cite real, reachable sources.",
            "Story: ${news_title} (${source_url})\nKey idea: ${key_idea}\nRationale: ${rationale}\n\
             Perspective: ${perspective}\n\
             Return {\"news_title\", \"source_url\", \"idea\", \"rationale\", \
             \"evidence\": [{\"idea\", \"evidence\", \"source_url\", \"rationale\", \"summary\"}]}.",
        ),
        crew(
            COUNTER_ARGS,
            "Counter-Argument Researcher",
            "Finds sources backing one counter-argument",
            "You are a fact-checker who steelmans opposing views.",
            "Story: ${news_title} (${source_url})\nCounter-argument: ${counter_argument}\n\
             Rationale: ${counter_rationale}\nPerspective: ${perspective}\n\
             Return {\"news_title\", \"counter_argument\": {\"counter_argument\", \"rationale\"}, \
             \"supporting_sources\": [{\"counter_argument\", \"rationale\", \"source_url\", \"summary\"}]}.",
        ),
    ];
    crews.push(CrewDef {
        id: WRITER.to_string(),
        name: "Feature Writer".to_string(),
        description: Some("Drafts the long-form article".to_string()),
        system_prompt: "You are a feature writer. Write in markdown.".to_string(),
        prompt_template: "Title: ${title}\nURL: ${url}\nOriginal content:\n${original_content}\n\n\
             Evidence: ${evidence}\nDatapoints: ${datapoints}\nCounter-arguments: ${counterarguments}\n\n\
             Perspective: ${perspective}\nTone: ${tone}\nLanguage: ${language}\n\
             Write the article."
            .to_string(),
        models: None,
    });
    crews
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_cover_every_stage() {
        let catalog = CrewCatalog::builtin();
        let ids: Vec<_> = catalog.all().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, CREW_ORDER.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        assert!(catalog.get(WRITER).unwrap().system_prompt.contains("markdown"));
        assert!(catalog.get(CRITIQUE).unwrap().system_prompt.contains("JSON"));
    }

    #[test]
    fn render_fills_known_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("topic", "Climate".to_string());
        assert_eq!(
            render_template("About ${topic}; missing ${other}; json {\"a\": 1}", &vars),
            "About Climate; missing ${other}; json {\"a\": 1}"
        );
    }

    #[test]
    fn directory_overrides_builtin_by_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("critique.yaml"),
            "id: critique\nname: Strict Critic\nsystem_prompt: be strict\nprompt_template: \"Judge ${news_title}\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("writer.md"),
            "---\nname: Poet\nsystem_prompt: rhyme\n---\nWrite a poem about ${title}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = CrewCatalog::with_dir(dir.path().to_str()).unwrap();
        assert_eq!(catalog.get(CRITIQUE).unwrap().name, "Strict Critic");
        let writer = catalog.get(WRITER).unwrap();
        assert_eq!(writer.name, "Poet");
        assert_eq!(writer.prompt_template, "Write a poem about ${title}");
        assert_eq!(catalog.all().len(), 7);
    }

    #[test]
    fn missing_directory_is_configuration_error() {
        let err = CrewCatalog::with_dir(Some("/nonexistent/crews")).unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
    }
}

//! Static prompt library served read-only by both transports. Seeded once
//! at startup; nothing mutates it at runtime.

use mcp_core::error::AppError;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub body: String,
}

#[derive(Clone)]
pub struct PromptRegistry {
    prompts: Vec<Prompt>,
}

impl PromptRegistry {
    pub fn seeded() -> Self {
        Self {
            prompts: vec![
                Prompt {
                    id: "lint-review".to_string(),
                    title: "Lint review".to_string(),
                    body: "Summarize the structural lint findings (functions, classes, imports, \
                           complexity) and flag anything that looks riskier than the complexity \
                           number alone suggests."
                        .to_string(),
                },
                Prompt {
                    id: "execution-postmortem".to_string(),
                    title: "Execution postmortem".to_string(),
                    body: "Given a sandboxed execution outcome (status, exit code, stdout, stderr), \
                           explain the most likely cause of a non-zero exit or timeout."
                        .to_string(),
                },
                Prompt {
                    id: "graph-upsert-plan".to_string(),
                    title: "Graph upsert plan".to_string(),
                    body: "Propose a minimal set of nodes and relationships to upsert for the given \
                           change, keyed by stable identifiers rather than database-generated ids."
                        .to_string(),
                },
            ],
        }
    }

    pub fn list(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn get(&self, id: &str) -> Result<&Prompt, AppError> {
        self.prompts
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("no such prompt: {id}")))
    }
}

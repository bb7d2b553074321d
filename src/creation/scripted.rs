use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    BranchSelection, CreationPrompter, ProjectTemplate, RepositorySelection, TemplateChoice,
};
use crate::error::CreationError;
use crate::repository::GitRepository;

/// A prepared answer to one prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ScriptedAnswer {
    Template {
        name: String,
    },
    Blank,
    Repository {
        url: String,
        #[serde(default)]
        branch: Option<String>,
    },
    Branch {
        #[serde(default)]
        branch: Option<String>,
    },
    Continue,
    Finish,
    Abort,
}

/// Answers prompts from a queue, for scripted batches and tests
///
/// Running out of answers counts as the user aborting.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<ScriptedAnswer>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next(&self, prompt: &str) -> Result<ScriptedAnswer, CreationError> {
        let answer = self
            .answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        debug!(prompt, ?answer, "Scripted answer");
        match answer {
            None | Some(ScriptedAnswer::Abort) => Err(CreationError::AbortedByUser),
            Some(answer) => Ok(answer),
        }
    }
}

fn unexpected(prompt: &str, answer: &ScriptedAnswer) -> CreationError {
    CreationError::Validation(format!("Expected an answer to {prompt}, got {answer:?}"))
}

#[async_trait]
impl CreationPrompter for ScriptedPrompter {
    async fn select_template(
        &self,
        templates: &[ProjectTemplate],
        _order: usize,
    ) -> Result<TemplateChoice, CreationError> {
        match self.next("select_template")? {
            ScriptedAnswer::Template { name } => templates
                .iter()
                .find(|t| t.name == name)
                .cloned()
                .map(TemplateChoice::Template)
                .ok_or_else(|| CreationError::Validation(format!("Unknown template: {name}"))),
            ScriptedAnswer::Blank => Ok(TemplateChoice::Blank),
            other => Err(unexpected("select_template", &other)),
        }
    }

    async fn select_repository(
        &self,
        _selection: RepositorySelection<'_>,
    ) -> Result<GitRepository, CreationError> {
        match self.next("select_repository")? {
            ScriptedAnswer::Repository { url, branch } => {
                let mut builder = GitRepository::from_url(url);
                if let Some(branch) = branch {
                    builder.branch(branch);
                }
                builder
                    .build()
                    .map_err(|e| CreationError::Validation(format!("{e:#}")))
            }
            other => Err(unexpected("select_repository", &other)),
        }
    }

    async fn select_branch(
        &self,
        selection: BranchSelection<'_>,
    ) -> Result<GitRepository, CreationError> {
        match self.next("select_branch")? {
            ScriptedAnswer::Branch { branch } => Ok(GitRepository {
                branch,
                ..selection.repository.clone()
            }),
            other => Err(unexpected("select_branch", &other)),
        }
    }

    async fn confirm_more(&self) -> Result<bool, CreationError> {
        match self.next("confirm_more")? {
            ScriptedAnswer::Continue => Ok(true),
            ScriptedAnswer::Finish => Ok(false),
            other => Err(unexpected("confirm_more", &other)),
        }
    }
}

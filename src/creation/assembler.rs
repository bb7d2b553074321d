use std::collections::HashMap;

use tracing::{debug, info};

use super::env::{resolve_env_vars, EnvLookup};
use super::names::{derive_name, suggest_unique_name};
use super::{
    BranchSelection, CreationConfig, CreationPrompter, CreationRequest, ProjectTemplate,
    RepositorySelection, TemplateChoice, WorkspaceSource,
};
use crate::error::CreationError;
use crate::git_provider::GitContextSource;
use crate::repository::GitRepository;
use crate::workspace::BuildConfig;

/// Where the creation flow is at
#[derive(Debug)]
enum Step {
    SelectSource,
    ResolveBranch(ProjectTemplate),
    ConfirmMore,
    Done,
    Aborted,
}

/// The requests collected so far in one batch
#[derive(Debug, Default)]
struct Batch {
    requests: Vec<CreationRequest>,
    /// How often each repository url has been picked
    selected_repos: HashMap<String, usize>,
}

impl Batch {
    /// Position of the workspace being selected, starting at 1
    fn order(&self) -> usize {
        self.requests.len() + 1
    }

    fn names(&self) -> Vec<&str> {
        self.requests.iter().map(|r| r.name.as_str()).collect()
    }

    fn unique_name(&self, candidate: &str) -> String {
        suggest_unique_name(candidate, &self.names())
    }

    fn select_repo(&mut self, url: &str) {
        *self.selected_repos.entry(url.to_string()).or_default() += 1;
    }

    fn push(&mut self, request: CreationRequest) -> Result<(), CreationError> {
        request.validate()?;
        if self.requests.iter().any(|r| r.name == request.name) {
            return Err(CreationError::Validation(format!(
                "Workspace name {} is already taken",
                request.name
            )));
        }

        debug!(name = %request.name, order = self.order(), "Adding workspace to batch");
        self.requests.push(request);
        Ok(())
    }
}

// Turns an abort into the Aborted step, every other error ends the flow
fn or_aborted(result: Result<Step, CreationError>) -> Result<Step, CreationError> {
    match result {
        Err(CreationError::AbortedByUser) => Ok(Step::Aborted),
        result => result,
    }
}

/// Builds the ordered, uniquely named list of workspaces to create
///
/// One assembler serves one batch at a time; all batch state lives inside
/// `assemble`.
pub struct CreationAssembler<'a> {
    git: &'a dyn GitContextSource,
    prompter: &'a dyn CreationPrompter,
    env: &'a dyn EnvLookup,
}

impl<'a> CreationAssembler<'a> {
    pub fn new(
        git: &'a dyn GitContextSource,
        prompter: &'a dyn CreationPrompter,
        env: &'a dyn EnvLookup,
    ) -> Self {
        Self { git, prompter, env }
    }

    /// Runs the creation flow until the user is done
    ///
    /// An abort discards everything selected so far.
    #[tracing::instrument(skip_all, fields(multi = config.multi_workspace), err)]
    pub async fn assemble(
        &self,
        config: &CreationConfig,
    ) -> Result<Vec<CreationRequest>, CreationError> {
        let mut batch = Batch::default();
        let mut step = Step::SelectSource;

        loop {
            step = match step {
                Step::SelectSource => or_aborted(self.select_source(config, &mut batch).await)?,
                Step::ResolveBranch(template) => {
                    or_aborted(self.add_template(config, &mut batch, template).await)?
                }
                Step::ConfirmMore if !config.multi_workspace => Step::Done,
                Step::ConfirmMore => match self.prompter.confirm_more().await {
                    Ok(true) => Step::SelectSource,
                    Ok(false) => Step::Done,
                    Err(e) => or_aborted(Err(e))?,
                },
                Step::Done => return Ok(self.finish(config, batch)),
                Step::Aborted => {
                    info!(
                        discarded = batch.requests.len(),
                        "Workspace creation aborted"
                    );
                    return Err(CreationError::AbortedByUser);
                }
            }
        }
    }

    async fn select_source(
        &self,
        config: &CreationConfig,
        batch: &mut Batch,
    ) -> Result<Step, CreationError> {
        if !config.templates.is_empty() && !config.blank_workspace {
            match self
                .prompter
                .select_template(&config.templates, batch.order())
                .await?
            {
                TemplateChoice::Template(template) => return Ok(Step::ResolveBranch(template)),
                TemplateChoice::Blank => debug!("Starting from a repository"),
            }
        }

        self.add_repository(config, batch).await?;
        Ok(Step::ConfirmMore)
    }

    async fn add_template(
        &self,
        config: &CreationConfig,
        batch: &mut Batch,
        template: ProjectTemplate,
    ) -> Result<Step, CreationError> {
        let repository = self
            .template_repository(config, &template, batch.order())
            .await?;
        batch.select_repo(&template.repository_url);

        let request = CreationRequest {
            name: batch.unique_name(&template.name),
            source: WorkspaceSource::Template {
                name: template.name,
                repository,
            },
            build_config: template.build_config,
            image: template
                .image
                .unwrap_or_else(|| config.defaults.image.clone()),
            user: template
                .user
                .unwrap_or_else(|| config.defaults.image_user.clone()),
            env_vars: template.env_vars,
        };

        batch.push(request)?;
        Ok(Step::ConfirmMore)
    }

    async fn template_repository(
        &self,
        config: &CreationConfig,
        template: &ProjectTemplate,
        order: usize,
    ) -> Result<GitRepository, CreationError> {
        let url = &template.repository_url;
        let mut repository = self
            .git
            .repository_context(url)
            .await
            .map_err(|e| CreationError::upstream("repository_context", e))?;
        let provider_id = self
            .git
            .provider_id_for_url(url)
            .await
            .map_err(|e| CreationError::upstream("provider_id_for_url", e))?;

        let branch = if config.skip_branch_selection {
            repository.branch.clone()
        } else {
            self.prompter
                .select_branch(BranchSelection {
                    provider_id: &provider_id,
                    namespace_id: &repository.owner,
                    repository: &repository,
                    order,
                })
                .await?
                .branch
        };

        repository.branch = branch.filter(|b| !b.is_empty());
        Ok(repository)
    }

    async fn add_repository(
        &self,
        config: &CreationConfig,
        batch: &mut Batch,
    ) -> Result<(), CreationError> {
        let selected = self
            .prompter
            .select_repository(RepositorySelection {
                git_providers: &config.git_providers,
                manual: config.manual,
                multi_workspace: config.multi_workspace,
                skip_branch_selection: config.skip_branch_selection,
                order: batch.order(),
                selected_repos: &batch.selected_repos,
            })
            .await?;
        batch.select_repo(&selected.url);

        let mut repository = self
            .git
            .repository_context(&selected.url)
            .await
            .map_err(|e| CreationError::upstream("repository_context", e))?;
        if repository.branch.is_none() {
            repository.branch = selected.branch;
        }

        let candidate = derive_name(&repository.name);
        if candidate.is_empty() {
            return Err(CreationError::Validation(format!(
                "Could not derive a workspace name from {}",
                repository.url
            )));
        }

        let request = CreationRequest {
            name: batch.unique_name(&candidate),
            source: WorkspaceSource::Repository { repository },
            build_config: Some(BuildConfig::default()),
            image: config.defaults.image.clone(),
            user: config.defaults.image_user.clone(),
            env_vars: HashMap::new(),
        };

        batch.push(request)
    }

    fn finish(&self, config: &CreationConfig, batch: Batch) -> Vec<CreationRequest> {
        info!(workspaces = batch.requests.len(), "Workspace batch assembled");

        batch
            .requests
            .into_iter()
            .map(|request| CreationRequest {
                env_vars: resolve_env_vars(config.profile_env.as_ref(), &request.env_vars, self.env),
                ..request
            })
            .collect()
    }
}

/// Assembles a batch with a fresh `CreationAssembler`
pub async fn assemble_creation_batch(
    config: &CreationConfig,
    git: &dyn GitContextSource,
    prompter: &dyn CreationPrompter,
    env: &dyn EnvLookup,
) -> Result<Vec<CreationRequest>, CreationError> {
    CreationAssembler::new(git, prompter, env)
        .assemble(config)
        .await
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::creation::{ScriptedAnswer, ScriptedPrompter, WorkspaceDefaults};
    use crate::error::UpstreamResponse;
    use crate::git_provider::UrlGitContext;

    fn template(name: &str, url: &str) -> ProjectTemplate {
        ProjectTemplate {
            name: name.to_string(),
            repository_url: url.to_string(),
            build_config: None,
            env_vars: HashMap::from([("API_TOKEN".to_string(), "$API_TOKEN".to_string())]),
            image: None,
            user: None,
            default: false,
        }
    }

    fn config() -> CreationConfig {
        CreationConfig {
            templates: vec![
                template("api", "https://github.com/org/api"),
                template("web", "https://github.com/org/web"),
            ],
            multi_workspace: true,
            defaults: WorkspaceDefaults {
                image: "ubuntu:noble".to_string(),
                image_user: "root".to_string(),
            },
            ..Default::default()
        }
    }

    fn env() -> HashMap<String, String> {
        HashMap::from([("API_TOKEN".to_string(), "secret".to_string())])
    }

    fn use_template(name: &str) -> ScriptedAnswer {
        ScriptedAnswer::Template {
            name: name.to_string(),
        }
    }

    fn branch(branch: &str) -> ScriptedAnswer {
        ScriptedAnswer::Branch {
            branch: Some(branch.to_string()),
        }
    }

    fn repository(url: &str) -> ScriptedAnswer {
        ScriptedAnswer::Repository {
            url: url.to_string(),
            branch: None,
        }
    }

    async fn assemble(
        config: &CreationConfig,
        answers: Vec<ScriptedAnswer>,
    ) -> Result<Vec<CreationRequest>, CreationError> {
        let git = UrlGitContext::default();
        let prompter = ScriptedPrompter::new(answers);
        let env = env();
        assemble_creation_batch(config, &git, &prompter, &env).await
    }

    fn names(requests: &[CreationRequest]) -> Vec<&str> {
        requests.iter().map(|r| r.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_repeated_template_gets_suffixed() {
        let answers = vec![
            use_template("api"),
            branch("main"),
            ScriptedAnswer::Continue,
            use_template("api"),
            branch("dev"),
            ScriptedAnswer::Continue,
            use_template("api"),
            branch(""),
            ScriptedAnswer::Finish,
        ];

        let requests = assemble(&config(), answers).await.unwrap();

        assert_eq!(names(&requests), vec!["api", "api2", "api3"]);
        let branches = requests
            .iter()
            .map(|r| r.source.repository().branch.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            branches,
            vec![Some("main".to_string()), Some("dev".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_template_request_fields() {
        let answers = vec![use_template("web"), branch("main"), ScriptedAnswer::Finish];

        let requests = assemble(&config(), answers).await.unwrap();

        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(
            request.source,
            WorkspaceSource::Template {
                name: "web".to_string(),
                repository: GitRepository::from_url("https://github.com/org/web")
                    .branch("main")
                    .build()
                    .unwrap(),
            }
        );
        assert_eq!(request.image, "ubuntu:noble");
        assert_eq!(request.user, "root");
        // $API_TOKEN got resolved
        assert_eq!(request.env_vars["API_TOKEN"], "secret");
    }

    #[tokio::test]
    async fn test_template_image_overrides_defaults() {
        let mut config = config();
        config.templates[0].image = Some("rust:1.80".to_string());
        config.multi_workspace = false;

        let requests = assemble(&config, vec![use_template("api"), branch("main")])
            .await
            .unwrap();

        assert_eq!(requests[0].image, "rust:1.80");
        assert_eq!(requests[0].user, "root");
    }

    #[tokio::test]
    async fn test_fresh_repository_path() {
        let mut config = config();
        config.templates.clear();
        config.multi_workspace = false;

        let requests = assemble(
            &config,
            vec![ScriptedAnswer::Repository {
                url: "https://github.com/Org/My%20Repo.git".to_string(),
                branch: Some("feature".to_string()),
            }],
        )
        .await
        .unwrap();

        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.name, "my-repo");
        assert_eq!(request.build_config, Some(BuildConfig::default()));
        assert_eq!(request.image, "ubuntu:noble");
        assert!(request.env_vars.is_empty());
        assert_eq!(
            request.source.repository().branch.as_deref(),
            Some("feature")
        );
        assert!(matches!(request.source, WorkspaceSource::Repository { .. }));
    }

    #[tokio::test]
    async fn test_blank_choice_and_mixed_sources_stay_unique() {
        let answers = vec![
            use_template("api"),
            branch("main"),
            ScriptedAnswer::Continue,
            ScriptedAnswer::Blank,
            repository("https://github.com/other/api.git"),
            ScriptedAnswer::Continue,
            ScriptedAnswer::Blank,
            repository("https://github.com/org/api"),
            ScriptedAnswer::Finish,
        ];

        let requests = assemble(&config(), answers).await.unwrap();

        assert_eq!(names(&requests), vec!["api", "api2", "api3"]);
    }

    #[tokio::test]
    async fn test_blank_workspace_skips_templates() {
        let mut config = config();
        config.blank_workspace = true;
        config.multi_workspace = false;

        let requests = assemble(&config, vec![repository("https://github.com/org/web")])
            .await
            .unwrap();

        assert_eq!(names(&requests), vec!["web"]);
    }

    #[tokio::test]
    async fn test_single_workspace_mode_never_asks_for_more() {
        let mut config = config();
        config.multi_workspace = false;
        let prompter = ScriptedPrompter::new(vec![
            use_template("api"),
            branch("main"),
            ScriptedAnswer::Continue,
        ]);
        let git = UrlGitContext::default();
        let env = env();

        let requests = assemble_creation_batch(&config, &git, &prompter, &env)
            .await
            .unwrap();

        assert_eq!(requests.len(), 1);
        assert_eq!(prompter.remaining(), 1);
    }

    #[tokio::test]
    async fn test_skip_branch_selection_uses_context_branch() {
        let mut config = config();
        config.skip_branch_selection = true;
        config.multi_workspace = false;
        config.templates[0].repository_url = "https://github.com/org/api/tree/release".to_string();

        let requests = assemble(&config, vec![use_template("api")]).await.unwrap();

        assert_eq!(
            requests[0].source.repository().branch.as_deref(),
            Some("release")
        );
    }

    #[tokio::test]
    async fn test_abort_discards_batch() {
        let answers = vec![
            use_template("api"),
            branch("main"),
            ScriptedAnswer::Continue,
            use_template("web"),
            ScriptedAnswer::Abort,
        ];

        let err = assemble(&config(), answers).await.unwrap_err();

        assert!(err.is_aborted());
    }

    #[tokio::test]
    async fn test_running_out_of_answers_aborts() {
        let err = assemble(&config(), vec![]).await.unwrap_err();

        assert!(err.is_aborted());
    }

    #[tokio::test]
    async fn test_underivable_name_is_a_validation_error() {
        let mut config = config();
        config.templates.clear();

        let err = assemble(&config, vec![repository("https://github.com/org/___")])
            .await
            .unwrap_err();

        assert!(matches!(err, CreationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_template_names_must_be_path_safe() {
        let mut config = config();
        config.templates[0].name = "..".to_string();

        let err = assemble(&config, vec![use_template(".."), branch("main")])
            .await
            .unwrap_err();

        assert!(matches!(err, CreationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_profile_env_is_merged_under_workspace_env() {
        let mut config = config();
        config.multi_workspace = false;
        config.profile_env = Some(HashMap::from([
            ("API_TOKEN".to_string(), "profile".to_string()),
            ("EDITOR".to_string(), "vim".to_string()),
            ("MISSING".to_string(), "$NOT_SET".to_string()),
        ]));

        let requests = assemble(&config, vec![use_template("api"), branch("main")])
            .await
            .unwrap();

        let expected = HashMap::from([
            ("API_TOKEN".to_string(), "secret".to_string()),
            ("EDITOR".to_string(), "vim".to_string()),
        ]);
        assert_eq!(requests[0].env_vars, expected);
    }

    #[derive(Debug)]
    struct FailingGit;

    #[async_trait]
    impl GitContextSource for FailingGit {
        async fn repository_context(&self, _url: &str) -> Result<GitRepository> {
            Err(UpstreamResponse {
                status: 401,
                message: "bad credentials".to_string(),
            }
            .into())
        }

        async fn provider_id_for_url(&self, _url: &str) -> Result<String> {
            Ok("github".to_string())
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_upstream_errors_are_returned() {
        let prompter = ScriptedPrompter::new(vec![use_template("api")]);
        let env = env();

        let err = assemble_creation_batch(&config(), &FailingGit, &prompter, &env)
            .await
            .unwrap_err();

        match err {
            CreationError::Upstream {
                operation,
                status,
                message,
                ..
            } => {
                assert_eq!(operation, "repository_context");
                assert_eq!(status, Some(401));
                assert_eq!(message, "bad credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

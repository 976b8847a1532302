use crate::paths::PathError;
use crate::RootContext;
use derive_more::{Display, From};
use git2::build::CheckoutBuilder;
use git2::{Repository, StatusOptions};
use log::{debug, info};
use std::path::{Path, PathBuf};

#[derive(Debug, From, Display)]
pub enum RepositoryError {
    #[display(fmt = "Unable to resolve the plugin repository: {}", _0)]
    Path(PathError),
    #[display(fmt = "Git error occurred while working with the plugin repository: {}", _0)]
    Git(git2::Error),
    #[display(fmt = "{} is not a git repository: {}", path, source)]
    #[from(ignore)]
    NotRepository { path: String, source: git2::Error },
    #[display(fmt = "{} does not exist.\nRun `$ {}`", path, clone_command)]
    #[from(ignore)]
    MissingPluginDir { path: String, clone_command: String },
    #[display(fmt = "Please provide a branch name")]
    #[from(ignore)]
    EmptyBranchName,
    #[display(fmt = "{} is dirty.\nPlease commit or stash your changes.", _0)]
    #[from(ignore)]
    DirtyWorkTree(String),
}

impl RepositoryError {
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            RepositoryError::EmptyBranchName | RepositoryError::DirtyWorkTree(_)
        )
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// The branch created by [`create_branch`]
#[derive(Debug)]
pub struct CreatedBranch {
    pub name: String,
    pub commit: git2::Oid,
    pub repository: PathBuf,
}

/// Creates a new branch named `name` in the plugin repository at the
/// current HEAD commit and checks it out. Refuses to touch anything
/// when the name is blank or the work tree has uncommitted changes.
pub fn create_branch(root: &RootContext, name: &str) -> RepoResult<CreatedBranch> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RepositoryError::EmptyBranchName);
    }

    let path = root.plugin_dir()?;
    if !path.exists() {
        return Err(RepositoryError::MissingPluginDir {
            path: path.display().to_string(),
            clone_command: root.clone_command()?,
        });
    }
    let repo = open_repository(&path)?;

    if !is_clean(&repo)? {
        return Err(RepositoryError::DirtyWorkTree(path.display().to_string()));
    }

    let commit = repo.head()?.peel_to_commit()?;
    let branch = repo.branch(name, &commit, false)?;
    let ref_name = branch
        .get()
        .name()
        .ok_or_else(|| git2::Error::from_str("branch reference name is not valid utf-8"))?
        .to_string();
    debug!("Created {ref_name} at {}", commit.id());

    repo.set_head(&ref_name)?;
    repo.checkout_head(Some(CheckoutBuilder::new().safe()))?;

    info!("Created branch {name} in {}", path.display());
    Ok(CreatedBranch {
        name: name.to_string(),
        commit: commit.id(),
        repository: path,
    })
}

/// Opens the repository at exactly `path` without searching parent
/// directories, so a missing clone never resolves to the site repository
fn open_repository(path: &Path) -> RepoResult<Repository> {
    Repository::open(path).map_err(|source| RepositoryError::NotRepository {
        path: path.display().to_string(),
        source,
    })
}

/// Checks whether every tracked file matches HEAD. Untracked and
/// ignored files do not count as changes.
fn is_clean(repo: &Repository) -> RepoResult<bool> {
    let mut options = StatusOptions::new();
    options
        .include_untracked(false)
        .include_ignored(false)
        .exclude_submodules(true);
    let statuses = repo.statuses(Some(&mut options))?;
    for entry in statuses.iter() {
        debug!("Changed: {:?} {:?}", entry.path(), entry.status());
    }
    Ok(statuses.is_empty())
}

/// Checks whether the provided path contains a git directory
pub fn is_valid_git(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref().join(".git");
    path.exists() && path.is_dir()
}

#[cfg(test)]
mod test {
    use crate::git::{create_branch, is_valid_git, RepositoryError};
    use crate::RootContext;
    use git2::{BranchType, Oid, Repository, Signature};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        _dirs: TempDir,
        context: RootContext,
        head: Oid,
    }

    impl Fixture {
        fn repo(&self) -> Repository {
            Repository::open(self.context.plugin_dir().unwrap()).unwrap()
        }
    }

    /// Creates a plugins root holding a `widget` repository with a
    /// single commit and a matching site working directory
    fn fixture() -> Fixture {
        let dirs = TempDir::new().unwrap();
        let plugins_root = dirs.path().join("plugins");
        let working_dir = dirs.path().join("site").join("widget");
        fs::create_dir_all(&working_dir).unwrap();

        let repo_path = plugins_root.join("widget");
        fs::create_dir_all(&repo_path).unwrap();
        let repo = Repository::init(&repo_path).unwrap();
        fs::write(repo_path.join("widget.php"), "<?php // Version: 1.0.0\n").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("widget.php")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::now("Plugged", "plugged@example.com").unwrap();
        let head = repo
            .commit(Some("HEAD"), &signature, &signature, "Initial", &tree, &[])
            .unwrap();

        Fixture {
            _dirs: dirs,
            context: RootContext::new(plugins_root, working_dir),
            head,
        }
    }

    fn head_name(repo: &Repository) -> String {
        repo.head().unwrap().name().unwrap().to_string()
    }

    #[test]
    fn creates_and_checks_out_branch() {
        let fixture = fixture();

        let created = create_branch(&fixture.context, "feature/forms").unwrap();
        assert_eq!(created.commit, fixture.head);

        let repo = fixture.repo();
        let branch = repo.find_branch("feature/forms", BranchType::Local).unwrap();
        assert_eq!(branch.get().target(), Some(fixture.head));
        assert_eq!(head_name(&repo), "refs/heads/feature/forms");
        assert!(repo.statuses(None).unwrap().is_empty());
    }

    #[test]
    fn dirty_work_tree_is_left_alone() {
        let fixture = fixture();
        let repo = fixture.repo();
        let before = head_name(&repo);
        let path = fixture.context.plugin_dir().unwrap().join("widget.php");
        fs::write(path, "<?php // Version: 1.0.1, edited locally\n").unwrap();

        let err = create_branch(&fixture.context, "feature").unwrap_err();
        assert!(matches!(err, RepositoryError::DirtyWorkTree(_)));
        assert!(err.is_guard());

        let repo = fixture.repo();
        assert!(repo.find_branch("feature", BranchType::Local).is_err());
        assert_eq!(head_name(&repo), before);
    }

    #[test]
    fn untracked_files_do_not_make_tree_dirty() {
        let fixture = fixture();
        let path = fixture.context.plugin_dir().unwrap().join("notes.txt");
        fs::write(path, "scratch").unwrap();

        create_branch(&fixture.context, "feature").unwrap();
        assert_eq!(head_name(&fixture.repo()), "refs/heads/feature");
    }

    #[test]
    fn blank_branch_name_is_rejected() {
        let fixture = fixture();
        let err = create_branch(&fixture.context, "   ").unwrap_err();
        assert!(matches!(err, RepositoryError::EmptyBranchName));
    }

    #[test]
    fn existing_branch_is_an_error() {
        let fixture = fixture();
        create_branch(&fixture.context, "feature").unwrap();
        let err = create_branch(&fixture.context, "feature").unwrap_err();
        assert!(matches!(err, RepositoryError::Git(_)));
        assert!(!err.is_guard());
    }

    #[test]
    fn missing_repository_is_reported() {
        let dirs = TempDir::new().unwrap();
        let context = RootContext::new(dirs.path().join("plugins"), dirs.path().join("widget"));
        let err = create_branch(&context, "feature").unwrap_err();
        assert!(matches!(err, RepositoryError::MissingPluginDir { .. }));
        assert!(err
            .to_string()
            .contains("git clone https://github.com/designcontainer/widget "));
        assert!(!context.plugins_root.exists());
    }

    #[test]
    fn plain_directory_is_not_a_repository() {
        let dirs = TempDir::new().unwrap();
        let context = RootContext::new(dirs.path().join("plugins"), dirs.path().join("widget"));
        fs::create_dir_all(context.plugin_dir().unwrap()).unwrap();

        let err = create_branch(&context, "feature").unwrap_err();
        assert!(matches!(err, RepositoryError::NotRepository { .. }));
        assert!(!is_valid_git(context.plugin_dir().unwrap()));
    }

    /// Asserts the guard refused to branch and left HEAD where it was
    fn assert_refused(fixture: &Fixture, before: &str) {
        let err = create_branch(&fixture.context, "feature").unwrap_err();
        assert!(matches!(err, RepositoryError::DirtyWorkTree(_)));

        let repo = fixture.repo();
        assert!(repo.find_branch("feature", BranchType::Local).is_err());
        assert_eq!(head_name(&repo), before);
    }

    #[test]
    fn staged_new_file_is_dirty() {
        let fixture = fixture();
        let repo = fixture.repo();
        let before = head_name(&repo);
        let path = fixture.context.plugin_dir().unwrap().join("forms.php");
        fs::write(path, "<?php\n").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("forms.php")).unwrap();
        index.write().unwrap();

        assert_refused(&fixture, &before);
    }

    #[test]
    fn deleted_tracked_file_is_dirty() {
        let fixture = fixture();
        let before = head_name(&fixture.repo());
        fs::remove_file(fixture.context.plugin_dir().unwrap().join("widget.php")).unwrap();

        assert_refused(&fixture, &before);
        assert_eq!(fixture.repo().head().unwrap().target(), Some(fixture.head));
    }
}

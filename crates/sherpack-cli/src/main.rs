//! Sherpack CLI - The Kubernetes package manager with Jinja2 templates

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;

mod commands;
mod display;
mod error;
mod exit_codes;
mod util;

#[derive(Parser)]
#[command(name = "sherpack")]
#[command(author = "Sherpack Contributors")]
#[command(version)]
#[command(about = "The Kubernetes package manager with Jinja2 templates", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Release storage backend: secrets (default, in-cluster), configmap, or file
    #[arg(long, global = true)]
    storage_driver: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render pack templates locally
    Template {
        /// Release name (for template context)
        name: String,

        /// Pack path
        pack: PathBuf,

        /// Values file(s) to merge
        #[arg(short = 'f', long = "values")]
        values: Vec<PathBuf>,

        /// Set values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,

        /// Target namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Output directory (if not set, outputs to stdout)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Show only specific template
        #[arg(short = 's', long)]
        show_only: Option<String>,

        /// Show rendered values
        #[arg(long)]
        show_values: bool,
    },

    /// Create a new pack
    Create {
        /// Pack name
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Lint a pack
    Lint {
        /// Pack path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Strict mode
        #[arg(long)]
        strict: bool,
    },

    /// Show pack information
    Show {
        /// Pack path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Show all information
        #[arg(long)]
        all: bool,
    },

    /// Validate values against the pack's schema
    Validate {
        /// Pack path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// External schema file (overrides the pack's own schema)
        #[arg(long = "schema")]
        schema: Option<PathBuf>,

        /// Single values file
        #[arg(long)]
        values_file: Option<PathBuf>,

        /// Values file(s) to merge
        #[arg(short = 'f', long = "values")]
        values: Vec<PathBuf>,

        /// Set values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,

        /// Verbose output
        #[arg(long)]
        verbose: bool,

        /// Emit JSON
        #[arg(long = "json")]
        json: bool,

        /// Fail on warnings too
        #[arg(long)]
        strict: bool,
    },

    /// Package a pack directory into an archive
    Package {
        /// Pack path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output archive path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sign the archive with this secret key
        #[arg(long)]
        sign_key: Option<PathBuf>,
    },

    /// Inspect a pack archive
    Inspect {
        /// Archive path
        archive: PathBuf,

        /// Show the embedded manifest
        #[arg(long)]
        show_manifest: bool,

        /// Show per-file checksums
        #[arg(long)]
        show_checksums: bool,
    },

    /// Generate a minisign keypair for signing archives
    Keygen {
        /// Output directory for the keypair
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Overwrite an existing keypair
        #[arg(long)]
        force: bool,

        /// Do not encrypt the secret key with a password
        #[arg(long)]
        no_password: bool,
    },

    /// Sign an archive with minisign
    Sign {
        /// Archive path
        archive: PathBuf,

        /// Secret key path (defaults to the keygen default location)
        #[arg(long)]
        key: Option<PathBuf>,

        /// Comment embedded in the signature
        #[arg(long)]
        comment: Option<String>,
    },

    /// Verify an archive's provenance signature
    Verify {
        /// Archive path
        archive: PathBuf,

        /// Public key path
        #[arg(long)]
        key: Option<PathBuf>,

        /// Fail if no signature is present
        #[arg(long)]
        require_signature: bool,
    },

    /// Convert a Helm chart into a Sherpack pack
    Convert {
        /// Path to the Helm chart
        chart: PathBuf,

        /// Output directory (defaults to "<chart>-sherpack")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing output directory
        #[arg(long)]
        force: bool,

        /// Preview without writing files
        #[arg(long)]
        dry_run: bool,

        /// Verbose conversion report
        #[arg(long)]
        verbose: bool,
    },

    /// Install a pack as a new release
    Install {
        /// Release name
        name: String,

        /// Pack path
        pack: PathBuf,

        /// Values file(s) to merge
        #[arg(short = 'f', long = "values")]
        values: Vec<PathBuf>,

        /// Set values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,

        /// Target namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Wait for resources to become ready
        #[arg(long)]
        wait: bool,

        /// Timeout in seconds for --wait
        #[arg(long)]
        timeout: Option<u64>,

        /// Roll back automatically on failure
        #[arg(long)]
        atomic: bool,

        /// Create the target namespace if missing
        #[arg(long)]
        create_namespace: bool,

        /// Render and validate without applying
        #[arg(long)]
        dry_run: bool,

        /// Print a diff of resources to be created
        #[arg(long)]
        show_diff: bool,

        /// Skip applying CRDs in crds/
        #[arg(long)]
        skip_crds: bool,
    },

    /// Upgrade an existing release
    Upgrade {
        /// Release name
        name: String,

        /// Pack path
        pack: PathBuf,

        /// Values file(s) to merge
        #[arg(short = 'f', long = "values")]
        values: Vec<PathBuf>,

        /// Set values on command line (key=value)
        #[arg(long = "set")]
        set: Vec<String>,

        /// Target namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Wait for resources to become ready
        #[arg(long)]
        wait: bool,

        /// Timeout in seconds for --wait
        #[arg(long)]
        timeout: Option<u64>,

        /// Roll back automatically on failure
        #[arg(long)]
        atomic: bool,

        /// Install the release if it doesn't exist yet
        #[arg(long)]
        install: bool,

        /// Upgrade a release stuck in Failed state
        #[arg(long)]
        force: bool,

        /// Discard previous user values, use only the new chart's defaults
        #[arg(long)]
        reset_values: bool,

        /// Merge previous user values beneath the new overrides
        #[arg(long)]
        reuse_values: bool,

        /// Skip hook execution
        #[arg(long)]
        no_hooks: bool,

        /// Render and validate without applying
        #[arg(long)]
        dry_run: bool,

        /// Print a diff against the current release
        #[arg(long)]
        show_diff: bool,

        /// Strategy for fields that become immutable on update
        #[arg(long)]
        immutable_strategy: Option<String>,

        /// Maximum number of revisions to retain
        #[arg(long)]
        max_history: Option<u32>,
    },

    /// Roll back to a previous release revision
    Rollback {
        /// Release name
        name: String,

        /// Target revision (0 = previous non-failed revision)
        #[arg(default_value_t = 0)]
        revision: u32,

        /// Target namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Wait for resources to become ready
        #[arg(long)]
        wait: bool,

        /// Timeout in seconds for --wait
        #[arg(long)]
        timeout: Option<u64>,

        /// Roll back a release stuck in Failed state
        #[arg(long)]
        force: bool,

        /// Skip hook execution
        #[arg(long)]
        no_hooks: bool,

        /// Render and validate without applying
        #[arg(long)]
        dry_run: bool,

        /// Print a diff against the current release
        #[arg(long)]
        show_diff: bool,

        /// Strategy for fields that become immutable on update
        #[arg(long)]
        immutable_strategy: Option<String>,

        /// Maximum number of revisions to retain
        #[arg(long)]
        max_history: Option<u32>,
    },

    /// Remove a release from Kubernetes
    Uninstall {
        /// Release name
        name: String,

        /// Target namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Wait for resources to be fully deleted
        #[arg(long)]
        wait: bool,

        /// Timeout in seconds for --wait
        #[arg(long)]
        timeout: Option<u64>,

        /// Keep release history after uninstalling
        #[arg(long)]
        keep_history: bool,

        /// Skip hook execution
        #[arg(long)]
        no_hooks: bool,

        /// Preview without deleting
        #[arg(long)]
        dry_run: bool,

        /// Also delete CRDs owned by this release
        #[arg(long)]
        delete_crds: bool,

        /// Required alongside --delete-crds; CRD deletion also deletes every
        /// CustomResource of those types
        #[arg(long)]
        confirm_crd_deletion: bool,
    },

    /// Show release history
    History {
        /// Release name
        name: String,

        /// Target namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Limit the number of revisions shown
        #[arg(long)]
        max: Option<usize>,

        /// Emit JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Show the status of a release
    Status {
        /// Release name
        name: String,

        /// Target namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Show live resource status
        #[arg(long)]
        show_resources: bool,

        /// Show user-supplied values
        #[arg(long)]
        show_values: bool,

        /// Show the rendered manifest
        #[arg(long)]
        show_manifest: bool,

        /// Emit JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// List installed releases
    List {
        /// Restrict to a namespace (defaults to all namespaces)
        #[arg(short, long)]
        namespace: Option<String>,

        /// List releases across all namespaces
        #[arg(short = 'A', long)]
        all_namespaces: bool,

        /// Emit JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Recover a release stuck in a Pending-* state
    Recover {
        /// Release name
        name: String,

        /// Target namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Manage pack dependencies
    Dep {
        #[command(subcommand)]
        command: DepCommands,
    },

    /// Manage pack repositories
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },

    /// Search for packs across configured repositories
    Search {
        /// Search query
        query: String,

        /// Restrict the search to one repository
        #[arg(long)]
        repo: Option<String>,

        /// Show all matching versions, not just the latest
        #[arg(long)]
        versions: bool,

        /// Emit JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Download a pack from a repository
    Pull {
        /// Pack reference: [repo/]name[:version] or oci://registry/repo:tag
        pack_ref: String,

        /// Version to pull (overrides any version in the reference)
        #[arg(long)]
        version: Option<String>,

        /// Output path for the archive (or directory with --untar)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Extract the archive instead of leaving it packaged
        #[arg(long)]
        untar: bool,
    },

    /// Push a pack archive to an OCI registry
    Push {
        /// Archive path
        archive: PathBuf,

        /// OCI destination, e.g. oci://registry/repo:tag
        destination: String,
    },
}

#[derive(Subcommand)]
enum DepCommands {
    /// List declared dependencies and their resolution status
    List {
        /// Pack path
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Resolve dependencies and download them into charts/
    Update {
        /// Pack path
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Resolve dependencies and write the lockfile without downloading
    Build {
        /// Pack path
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Verify downloaded archive digests against the lockfile
        #[arg(long)]
        verify: bool,
    },

    /// Print the resolved dependency tree
    Tree {
        /// Pack path
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Add a repository
    Add {
        /// Repository name
        name: String,

        /// Repository URL
        url: String,

        /// Basic auth username
        #[arg(long)]
        username: Option<String>,

        /// Basic auth password
        #[arg(long)]
        password: Option<String>,

        /// Bearer token
        #[arg(long)]
        token: Option<String>,
    },

    /// List configured repositories
    List {
        /// Show stored credential metadata
        #[arg(long)]
        show_auth: bool,
    },

    /// Refresh a repository's index (or all, if omitted)
    Update {
        /// Repository name
        name: Option<String>,
    },

    /// Remove a repository
    Remove {
        /// Repository name
        name: String,
    },
}

fn init_logging(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let default_directive = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();

    init_logging(cli.debug);

    // Set debug level
    if cli.debug {
        // SAFETY: We're the only thread at this point (start of main)
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }

    match cli.command {
        Commands::Template {
            name,
            pack,
            values,
            set,
            namespace,
            output_dir,
            show_only,
            show_values,
        } => commands::template::run(
            &name,
            &pack,
            &values,
            &set,
            &namespace,
            output_dir.as_deref(),
            show_only.as_deref(),
            show_values,
            cli.debug,
        ),

        Commands::Create { name, output } => commands::create::run(&name, &output),

        Commands::Lint { path, strict } => commands::lint::run(&path, strict),

        Commands::Show { path, all } => commands::show::run(&path, all),

        Commands::Validate {
            path,
            schema,
            values_file,
            values,
            set,
            verbose,
            json,
            strict,
        } => commands::validate::run(
            &path,
            schema.as_deref(),
            values_file.as_deref(),
            &values,
            &set,
            verbose,
            json,
            strict,
        ),

        Commands::Package {
            path,
            output,
            sign_key,
        } => commands::package::run(&path, output.as_deref(), sign_key.as_deref()),

        Commands::Inspect {
            archive,
            show_manifest,
            show_checksums,
        } => commands::inspect::run(&archive, show_manifest, show_checksums),

        Commands::Keygen {
            output_dir,
            force,
            no_password,
        } => commands::keygen::run(output_dir.as_deref(), force, no_password),

        Commands::Sign {
            archive,
            key,
            comment,
        } => commands::sign::run(&archive, key.as_deref(), comment.as_deref()),

        Commands::Verify {
            archive,
            key,
            require_signature,
        } => commands::verify::run(&archive, key.as_deref(), require_signature),

        Commands::Convert {
            chart,
            output,
            force,
            dry_run,
            verbose,
        } => commands::convert::run(&chart, output.as_deref(), force, dry_run, verbose),

        Commands::Install {
            name,
            pack,
            values,
            set,
            namespace,
            wait,
            timeout,
            atomic,
            create_namespace,
            dry_run,
            show_diff,
            skip_crds,
        } => Ok(util::run_cancellable(
            &name,
            "install",
            commands::install::run(
                &name,
                &pack,
                &values,
                &set,
                &namespace,
                wait,
                timeout,
                atomic,
                create_namespace,
                dry_run,
                show_diff,
                skip_crds,
            ),
        )
        .await?),

        Commands::Upgrade {
            name,
            pack,
            values,
            set,
            namespace,
            wait,
            timeout,
            atomic,
            install,
            force,
            reset_values,
            reuse_values,
            no_hooks,
            dry_run,
            show_diff,
            immutable_strategy,
            max_history,
        } => Ok(util::run_cancellable(
            &name,
            "upgrade",
            commands::upgrade::run(
                &name,
                &pack,
                &values,
                &set,
                &namespace,
                wait,
                timeout,
                atomic,
                install,
                force,
                reset_values,
                reuse_values,
                no_hooks,
                dry_run,
                show_diff,
                immutable_strategy.as_deref(),
                max_history,
            ),
        )
        .await?),

        Commands::Rollback {
            name,
            revision,
            namespace,
            wait,
            timeout,
            force,
            no_hooks,
            dry_run,
            show_diff,
            immutable_strategy,
            max_history,
        } => Ok(util::run_cancellable(
            &name,
            "rollback",
            commands::rollback::run(
                &name,
                revision,
                &namespace,
                wait,
                timeout,
                force,
                no_hooks,
                dry_run,
                show_diff,
                immutable_strategy.as_deref(),
                max_history,
            ),
        )
        .await?),

        Commands::Uninstall {
            name,
            namespace,
            wait,
            timeout,
            keep_history,
            no_hooks,
            dry_run,
            delete_crds,
            confirm_crd_deletion,
        } => Ok(util::run_cancellable(
            &name,
            "uninstall",
            commands::uninstall::run(
                &name,
                &namespace,
                wait,
                timeout,
                keep_history,
                no_hooks,
                dry_run,
                delete_crds,
                confirm_crd_deletion,
            ),
        )
        .await?),

        Commands::History {
            name,
            namespace,
            max,
            json,
        } => Ok(commands::history::run(&name, &namespace, max, json).await?),

        Commands::Status {
            name,
            namespace,
            show_resources,
            show_values,
            show_manifest,
            json,
        } => Ok(commands::status::run(
            &name,
            &namespace,
            show_resources,
            show_values,
            show_manifest,
            json,
        )
        .await?),

        Commands::List {
            namespace,
            all_namespaces,
            json,
        } => Ok(commands::list::run(namespace.as_deref(), all_namespaces, json).await?),

        Commands::Recover { name, namespace } => {
            Ok(commands::recover::run(&name, &namespace).await?)
        }

        Commands::Dep { command } => match command {
            DepCommands::List { path } => Ok(commands::dep::list(&path).await?),
            DepCommands::Update { path } => Ok(commands::dep::update(&path).await?),
            DepCommands::Build { path, verify } => Ok(commands::dep::build(&path, verify).await?),
            DepCommands::Tree { path } => Ok(commands::dep::tree(&path).await?),
        },

        Commands::Repo { command } => match command {
            RepoCommands::Add {
                name,
                url,
                username,
                password,
                token,
            } => Ok(commands::repo::add(
                &name,
                &url,
                username.as_deref(),
                password.as_deref(),
                token.as_deref(),
            )
            .await?),
            RepoCommands::List { show_auth } => Ok(commands::repo::list(show_auth).await?),
            RepoCommands::Update { name } => Ok(commands::repo::update(name.as_deref()).await?),
            RepoCommands::Remove { name } => Ok(commands::repo::remove(&name).await?),
        },

        Commands::Search {
            query,
            repo,
            versions,
            json,
        } => Ok(commands::search::run(&query, repo.as_deref(), versions, json).await?),

        Commands::Pull {
            pack_ref,
            version,
            output,
            untar,
        } => Ok(commands::pull::run(&pack_ref, version.as_deref(), output.as_ref(), untar).await?),

        Commands::Push {
            archive,
            destination,
        } => Ok(commands::push::run(&archive, &destination).await?),
    }
}

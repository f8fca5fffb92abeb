use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rigpm::{
    detect_host_architecture, detect_host_os, CancellationToken, Config, CpuArchitecture,
    DependencyGraph, ImageDocument, ImageLock, ImageSpecifier, Repository, Resolver,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

#[allow(clippy::too_many_arguments)]
pub fn run_install(
    image: String,
    merge: bool,
    non_interactive: bool,
    os_override: Option<String>,
    architecture_override: Option<String>,
    dry_run: bool,
    extra_repositories: Vec<String>,
) -> Result<()> {
    let config = Config::load()?;

    // The argument is either a document on disk or the document itself.
    let content = if Path::new(&image).is_file() {
        fs::read_to_string(&image)?
    } else {
        image.clone()
    };
    let document = ImageDocument::parse(&content)?;

    let target_os = os_override
        .or(document.os.clone())
        .or(config.target.os.clone())
        .unwrap_or_else(detect_host_os);
    let target_arch: CpuArchitecture = match architecture_override {
        Some(text) => text.parse()?,
        None => document
            .architecture
            .or(config.target.architecture)
            .unwrap_or_else(detect_host_architecture),
    };

    // Explicit --repository flags win over the image's own list, which in
    // turn wins over configured defaults.
    let mut repositories = extra_repositories;
    repositories.extend(document.repositories.clone());
    repositories.extend(config.repositories.clone());
    let mut seen = std::collections::HashSet::new();
    repositories.retain(|location| seen.insert(location.clone()));

    let spec = if merge {
        let installed = ImageLock::load(".")?
            .map(|lock| lock.installed_packages())
            .unwrap_or_default();
        rigpm::merge(
            document.packages,
            installed,
            repositories.clone(),
            target_os.clone(),
            target_arch,
        )?
    } else {
        ImageSpecifier::builder()
            .os(target_os.clone())
            .architecture(target_arch)
            .repositories(repositories.clone())
            .packages(document.packages)
            .build()?
    };

    let clients: Vec<Repository> = spec
        .repositories
        .iter()
        .map(|location| Repository::connect(location))
        .collect::<rigpm::Result<_>>()?;

    let cancel = CancellationToken::new();

    let spinner = create_spinner("Loading package definitions...");
    let graph = match DependencyGraph::populate(&spec, &clients, &cancel) {
        Ok(graph) => {
            spinner.finish_and_clear();
            graph
        }
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    let resolution = Resolver::new(&graph).resolve(&spec, &cancel)?;

    if config.resolver.verbose_conflicts {
        for conflict in &resolution.conflicts {
            eprintln!("{}", conflict);
        }
    }
    if !resolution.success {
        if let Some(path) = &config.resolver.diagnostic_graph_file {
            fs::write(path, resolution.diagnostic.render())?;
            eprintln!("Diagnostic graph written to {}", path);
        }
    }

    let resolved = resolution.into_identifier()?;

    println!(
        "Resolved {} package(s) for {}/{}:",
        resolved.len(),
        target_os,
        target_arch
    );
    for package in resolved.packages_by_name() {
        match &package.source_repository {
            Some(repo) => println!("  {} {} ({})", package.name, package.version, repo),
            None => println!("  {} {} (side-loaded)", package.name, package.version),
        }
    }

    if dry_run {
        return Ok(());
    }

    if !non_interactive && !confirm("Write image.lock.json?")? {
        println!("Aborted.");
        return Ok(());
    }

    let lock = ImageLock::from_image(&resolved, &target_os, target_arch);
    lock.save(".")?;
    println!("Wrote {}", rigpm::LOCK_FILE_NAME);

    Ok(())
}

fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [Y/n] ", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(!answer.trim().to_lowercase().starts_with('n'))
}

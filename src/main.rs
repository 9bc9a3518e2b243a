use anyhow::{anyhow, Context, Result};
use cli::{Cli, Commands, RenderArgs};
use config::{Configuration, CONFIG_FILE};
use formats::{plan_formats, render_formats, FormatJob, FormatOutput};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use style::descriptor::{CLASSIC_STYLE, MODERN_STYLE};
use style::{PageSize, ResolvedStyle, StyleDescriptor, StyleResolver};

mod cli;
mod config;
mod flow;
mod formats;
mod pagination;
mod render;
mod source;
mod style;

fn main() -> ExitCode {
    if let Err(e) = try_main() {
        eprintln!("{}: {e:#}", console::style("Error").red());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    use clap::Parser;
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match &cli.command {
        Commands::Init { force } => init(*force),
        Commands::Render(args) => render(args),
        Commands::Plan(args) => plan(args),
    }
}

fn init(force: bool) -> Result<()> {
    let config = toml::to_string_pretty(&Configuration::starter())
        .with_context(|| "Failed to serialize configuration")?;
    let files = [
        (PathBuf::from(CONFIG_FILE), config.as_str()),
        (PathBuf::from("styles/classic.json"), CLASSIC_STYLE),
        (PathBuf::from("styles/modern.json"), MODERN_STYLE),
    ];

    if !force {
        if let Some((existing, _)) = files.iter().find(|(path, _)| path.exists()) {
            return Err(anyhow!(
                "{} already exists, use --force to overwrite it",
                existing.display()
            ));
        }
    }

    for (path, contents) in &files {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", console::style(path.display()).green());
    }
    Ok(())
}

/// Everything loaded from disk that a render or a plan needs.
struct Project {
    config: Configuration,
    document: source::Document,
    resolver: StyleResolver,
    style: ResolvedStyle,
    highlighter: flow::CodeHighlighter,
    formats: Vec<PageSize>,
}

impl Project {
    fn load(args: &RenderArgs) -> Result<Project> {
        println!("Loading configuration...");
        let mut config = Configuration::load(&args.config)?;
        if let Some(content) = &args.content {
            config.input.content = content.clone();
        }
        if let Some(style) = &args.style {
            config.style.path = Some(style.clone());
        }
        if !args.formats.is_empty() {
            config.output.formats = args.formats.clone();
        }
        if args.max_pages_per_part.is_some() {
            config.output.max_pages_per_part = args.max_pages_per_part;
        }
        if let Some(dir) = &args.out_dir {
            config.output.directory = dir.clone();
        }
        if config.output.max_pages_per_part == Some(0) {
            return Err(anyhow!("max_pages_per_part must be at least 1"));
        }

        let mut formats: Vec<PageSize> = Vec::new();
        for name in &config.output.formats {
            let format: PageSize = name.parse().map_err(|e: String| anyhow!(e))?;
            if !formats.contains(&format) {
                formats.push(format);
            }
        }

        let document = source::load_document(&config.input.content)?;
        let descriptor = match &config.style.path {
            Some(path) => StyleDescriptor::load(path)?,
            None => StyleDescriptor::classic()?,
        };
        let mut resolver = StyleResolver::new(&config.style.fonts_dir);
        let style = resolver
            .resolve(&descriptor)
            .with_context(|| "Failed to resolve style")?;
        let highlighter =
            flow::CodeHighlighter::load().with_context(|| "Failed to load syntax highlighting")?;

        Ok(Project {
            config,
            document,
            resolver,
            style,
            highlighter,
            formats,
        })
    }

    fn job(&self) -> FormatJob<'_> {
        let base_name = self
            .config
            .output
            .base_name
            .clone()
            .unwrap_or_else(|| self.document.title.clone());
        FormatJob {
            document: &self.document,
            resolver: &self.resolver,
            style: &self.style,
            highlighter: &self.highlighter,
            formats: self.formats.clone(),
            max_pages_per_part: self.config.output.max_pages_per_part,
            images_dir: self.config.input.images_dir(),
            output_dir: self.config.output.directory.clone(),
            base_name,
        }
    }
}

fn render(args: &RenderArgs) -> Result<()> {
    let project = Project::load(args)?;
    let job = project.job();
    let plans = plan_formats(&job)?;
    let total_parts: usize = plans.iter().map(|p| p.parts.len()).sum();
    let progress = ProgressBar::new(total_parts as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("can parse progress style")
            .progress_chars("#>-"),
    );
    progress.set_message("Rendering PDFs...");

    let outputs = render_formats(&job, &plans, &mut |part| {
        progress.set_message(format!("Wrote {}", part.path.display()));
        progress.inc(1);
    })?;
    progress.finish_and_clear();

    print_summary(&outputs);
    let failed: usize = outputs.iter().map(|o| o.failed_parts.len()).sum();
    if failed > 0 {
        return Err(anyhow!("{failed} of {total_parts} parts failed to render"));
    }
    Ok(())
}

fn print_summary(outputs: &[FormatOutput]) {
    for output in outputs {
        println!();
        println!("{}:", console::style(output.format).bold());
        for part in &output.parts {
            let chapters = match (part.chapters.first(), part.chapters.last()) {
                (Some(first), Some(last)) if first != last => format!("chapters {first}-{last}"),
                (Some(first), _) => format!("chapter {first}"),
                _ => "no chapters".to_string(),
            };
            println!(
                "  Part {}: {} ({}, {} pages)",
                part.number,
                part.path.display(),
                chapters,
                part.report.page_count
            );
            if part.report.error_markers > 0 {
                println!(
                    "    {} {} blocks could not be rendered",
                    console::style("warning:").yellow(),
                    part.report.error_markers
                );
            }
            if !part.report.unnumbered_pages.is_empty() {
                println!(
                    "    {} {} pages have no page number",
                    console::style("warning:").yellow(),
                    part.report.unnumbered_pages.len()
                );
            }
        }
        for number in &output.failed_parts {
            println!("  Part {number}: {}", console::style("failed").red());
        }
    }
}

fn plan(args: &RenderArgs) -> Result<()> {
    let project = Project::load(args)?;
    let job = project.job();
    let plans = plan_formats(&job)?;

    for plan in &plans {
        println!();
        println!(
            "{} ({:.0} x {:.0} pt, ~{:.0} characters per page):",
            console::style(plan.format).bold(),
            plan.style.geometry.width,
            plan.style.geometry.height,
            pagination::chars_per_page(&plan.style)
        );
        for part in &plan.parts {
            println!("  Part {} (~{} pages)", part.number, part.estimated_pages);
            for &index in &part.chapters {
                let chapter = &plan.chapters[index];
                println!(
                    "    {:>3}. {} (~{} pages)",
                    chapter.number,
                    chapter.title,
                    pagination::estimate(&chapter.items, &plan.style)
                );
            }
        }
    }
    Ok(())
}

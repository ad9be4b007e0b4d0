use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use revgraph::graph::{EntryAction, GraphOptions, RevisionGraph};
use revgraph::graph::classify::PathClassifier;
use revgraph::log::cache::LogSource;
use revgraph::log::parser::LogFile;
use revgraph::log::record::Revision;

#[derive(Parser)]
#[command(
    name = "revgraph",
    version = "0.1.0",
    about = "Revision graph builder for Subversion logs",
    long_about = "Builds the revision graph of a path from a Subversion log dump: \
    which revisions changed it, where it was copied from and copied to, \
    and where on a grid each node belongs.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[arg(index = 1, help = "Log file as produced by 'svn log -v', or '-' for stdin")]
    logfile: String,

    #[arg(short, long, default_value = "/", help = "Repository path to graph")]
    path: String,

    #[arg(long, help = "Peg revision; defaults to the newest one in the log")]
    peg: Option<Revision>,

    #[arg(long, help = "Show changes to sub-paths as nodes of their own")]
    show_all: bool,

    #[arg(long, help = "Mark still-live branches with a head node")]
    show_head: bool,

    #[arg(long, help = "Oldest revision on top instead of the newest")]
    oldest_at_top: bool,

    #[arg(long, help = "Give every node its own row, branches grouped")]
    group_branches: bool,

    #[arg(long, help = "Keep a spacer row between stacked branches")]
    reduce_cross_lines: bool,

    #[arg(long, help = "Drop branches whose whole subtree was deleted")]
    remove_deleted: bool,

    #[arg(long, help = "Collapse unmodified tags into annotations")]
    fold_tags: bool,

    #[arg(long, help = "Use the copy revision itself as the copy source")]
    exact_copy_sources: bool,

    #[arg(long, default_value_t = 0, help = "Hide nodes below this revision")]
    min_rev: Revision,

    #[arg(long, default_value_t = Revision::MAX, help = "Hide nodes above this revision")]
    max_rev: Revision,

    #[arg(long, default_value = "", help = "Hide nodes whose path contains one of these '*'-separated strings")]
    exclude: String,

    #[arg(long, default_value = "trunk", help = "Trunk name patterns, ';'-separated")]
    trunk: String,

    #[arg(long, default_value = "branches", help = "Branch name patterns, ';'-separated")]
    branches: String,

    #[arg(long, default_value = "tags", help = "Tag name patterns, ';'-separated")]
    tags: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let text = if cli.logfile == "-" {
        std::io::read_to_string(std::io::stdin()).context("cannot read log from stdin")?
    } else {
        std::fs::read_to_string(&cli.logfile)
            .with_context(|| format!("cannot read log file {}", cli.logfile))?
    };
    let source = LogFile::parse(&text)?;

    let options = GraphOptions {
        include_sub_path_changes: cli.show_all,
        show_wc_rev: false,
        show_head: cli.show_head,
        oldest_at_top: cli.oldest_at_top,
        group_branches: cli.group_branches,
        reduce_cross_lines: cli.reduce_cross_lines,
        remove_deleted_ones: cli.remove_deleted,
        fold_tags: cli.fold_tags,
        exact_copy_sources: cli.exact_copy_sources,
    };

    let mut graph = RevisionGraph::new(source);
    graph.set_classifier(PathClassifier::new(&cli.trunk, &cli.branches, &cli.tags));
    graph.set_filter(cli.min_rev, cli.max_rev, &cli.exclude);
    graph.fetch_revision_data(&cli.path, cli.peg)?;
    graph.analyze_revision_data(&cli.path, options)?;

    print_graph(&graph);
    Ok(())
}

fn print_graph<S: LogSource>(graph: &RevisionGraph<S>) {
    let store = graph.entries();
    let dictionary = graph.log().dictionary();

    let mut handles: Vec<_> = store.entries().to_vec();
    handles.sort_by_key(|&h| (store.get(h).row, store.get(h).column));

    for handle in handles {
        let entry = store.get(handle);
        let letter = entry.action.letter().to_string();
        let letter = match entry.action {
            EntryAction::Added | EntryAction::AddedWithHistory => letter.green(),
            EntryAction::Deleted => letter.red(),
            EntryAction::Renamed | EntryAction::Replaced => letter.yellow(),
            EntryAction::LastCommit | EntryAction::Source => letter.cyan(),
            _ => letter.normal(),
        };

        println!(
            "r{:<6} [{:>2},{:>3}] {} {}",
            entry.revision,
            entry.column,
            entry.row,
            letter,
            entry.path.to_path_string(dictionary),
        );

        for tag in &entry.tags {
            let marker = if tag.alias { "alias" } else { "tag" };
            let line = format!("{:>18} {} {}", "", marker, tag.path);
            if tag.deleted {
                println!("{}", line.dimmed());
            } else {
                println!("{line}");
            }
        }
    }

    if store.is_empty()
        && let Some(message) = graph.last_error_message()
    {
        eprintln!("{}", message.red());
    }
}

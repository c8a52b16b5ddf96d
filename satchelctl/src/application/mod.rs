pub mod handlers;

use std::io::Write;

use satchel_core::error::{Result, SatchelError};
use satchel_core::{ArchiveMutationEngine, Config, StoreConfig, open_store};

use crate::presentation::cli::{Cli, Commands, GlobalArgs};
use handlers::EntryEdit;

/// Resolve the configuration: the file named by `--config` (if any), with
/// `--store-root` replacing its store.
pub fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut cfg = match &global.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    match (&global.store_root, &global.config) {
        (Some(root), _) => cfg.store = StoreConfig::Local { root: root.clone() },
        (None, None) => {
            return Err(SatchelError::Config(
                "no store configured; pass --store-root or --config".into(),
            ));
        }
        (None, Some(_)) => {}
    }
    Ok(cfg)
}

fn build_engine(global: &GlobalArgs) -> Result<ArchiveMutationEngine> {
    let cfg = load_config(global)?;
    let store = open_store(&cfg.store)?;
    Ok(ArchiveMutationEngine::new(store, cfg.engine))
}

pub fn run(cli: Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let result = match cli.command {
        // Packing to a local file needs no store.
        Commands::Pack {
            dir,
            out: out_file,
            deterministic,
            codec,
        } => {
            let level = match &cli.global.config {
                Some(path) => Config::from_json_file(path)?.engine.zstd_level,
                None => Config::default().engine.zstd_level,
            };
            handlers::handle_pack(&dir, &out_file, deterministic, codec.into(), level, &mut out)
        }
        Commands::Tools { describe: true } => handlers::handle_tools_describe(&mut out),
        command => {
            let engine = build_engine(&cli.global)?;
            dispatch(engine, command, &mut out)
        }
    };
    out.flush()?;
    result
}

fn dispatch(engine: ArchiveMutationEngine, command: Commands, out: &mut dyn Write) -> Result<()> {
    let stdin = std::io::stdin();
    match command {
        Commands::Upload {
            source,
            deterministic,
        } => handlers::handle_upload(&engine, &source, deterministic, out),
        Commands::Ls { key, prefix, long } => handlers::handle_ls(&engine, &key, &prefix, long, out),
        Commands::Cat { key, path } => handlers::handle_cat(&engine, &key, &path, out),
        Commands::Stat { key } => handlers::handle_stat(&engine, &key, out),
        Commands::Apply {
            key,
            batch,
            if_match,
        } => handlers::handle_apply(&engine, &key, batch, if_match, &mut stdin.lock(), out),
        Commands::Create { key, path, content } => {
            handlers::handle_entry_edit(&engine, &key, &path, EntryEdit::Create, content, &mut stdin.lock(), out)
        }
        Commands::Edit { key, path, content } => {
            handlers::handle_entry_edit(&engine, &key, &path, EntryEdit::Replace, content, &mut stdin.lock(), out)
        }
        Commands::Append { key, path, content } => {
            handlers::handle_entry_edit(&engine, &key, &path, EntryEdit::Append, content, &mut stdin.lock(), out)
        }
        Commands::Rm { key, path } => handlers::handle_entry_edit(
            &engine,
            &key,
            &path,
            EntryEdit::Delete,
            String::new(),
            &mut stdin.lock(),
            out,
        ),
        Commands::Extract { key, dest } => handlers::handle_extract(&engine, &key, &dest, out),
        Commands::Remove { key } => handlers::handle_remove(&engine, &key, out),
        Commands::Tools { describe: false } => handlers::handle_tools_serve(engine, &mut stdin.lock(), out),
        Commands::Pack { .. } | Commands::Tools { describe: true } => {
            unreachable!("handled without a store")
        }
    }
}

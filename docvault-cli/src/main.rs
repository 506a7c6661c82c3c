use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docvault_core::codec;
use docvault_core::{
    generate_id, Commit, DecodePolicy, FileLock, Record, Store, StoreConfig, VaultError,
};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "docvault")]
#[command(about = "docvault CLI - inspect and edit a data directory under the store's file locks")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct GlobalArgs {
    /// Data directory (overrides DOCVAULT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Lock wait in milliseconds (overrides DOCVAULT_LOCK_TIMEOUT_MS)
    #[arg(long, global = true)]
    lock_timeout_ms: Option<u64>,

    /// Fail on unreadable files instead of treating them as empty
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every record of a collection
    List { collection: String },
    /// Print one record
    Get { collection: String, id: String },
    /// Insert a JSON object; an id is generated when missing
    Insert { collection: String, json: String },
    /// Set one top-level field of a record to a JSON value
    Set {
        collection: String,
        id: String,
        field: String,
        /// JSON value; bare words are taken as strings
        value: String,
    },
    /// Remove one record
    Remove { collection: String, id: String },
    /// Print a singleton document
    DocGet { name: String },
    /// Replace a singleton document with a JSON object
    DocSet { name: String, json: String },
    /// Print a fresh record id
    NewId,
    /// Load a dump: { "collection": [records...], "document": {...} }
    Import { file: PathBuf },
    /// Dump collections and documents to a JSON file
    Export {
        file: PathBuf,
        /// Export only this collection
        #[arg(long)]
        collection: Option<String>,
    },
}

fn main() -> Result<()> {
    docvault_core::init_from_env();
    let cli = Cli::parse();
    let global = cli.global;
    let store = || open_store(&global);

    match cli.command {
        Commands::List { collection } => {
            let records = store()?.collection(&collection)?.list()?;
            print_json(&Value::Array(records.into_iter().map(Value::from).collect()))
        }
        Commands::Get { collection, id } => match store()?.collection(&collection)?.find(&id)? {
            Some(record) => print_json(&record.into_value()),
            None => bail!("Record '{}' not found in '{}'", id, collection),
        },
        Commands::Insert { collection, json } => {
            let mut object = parse_object(&json)?;
            if !object.contains_key("id") {
                object.insert("id".to_string(), Value::String(generate_id()));
            }
            let stored = store()?
                .collection(&collection)?
                .insert(Record::from_map(object))
                .with_context(|| format!("Failed to insert into '{}'", collection))?;
            print_json(&stored.into_value())
        }
        Commands::Set {
            collection,
            id,
            field,
            value,
        } => {
            if field == "id" {
                bail!("The id of a record cannot be changed");
            }
            let value = parse_value(&value);
            let updated = store()?.collection(&collection)?.update_where(&id, |record| {
                record.set(field, value);
                Ok(())
            })?;
            print_json(&updated.into_value())
        }
        Commands::Remove { collection, id } => {
            let removed = store()?.collection(&collection)?.remove_where(&id)?;
            print_json(&removed.into_value())
        }
        Commands::DocGet { name } => match store()?.document(&name)?.read()? {
            Some(record) => print_json(&record.into_value()),
            None => print_json(&Value::Object(Map::new())),
        },
        Commands::DocSet { name, json } => {
            let object = parse_object(&json)?;
            store()?.document(&name)?.write(Record::from_map(object))?;
            Ok(())
        }
        Commands::NewId => {
            println!("{}", generate_id());
            Ok(())
        }
        Commands::Import { file } => import_data(&store()?, &file),
        Commands::Export { file, collection } => {
            export_data(&store()?, &file, collection.as_deref())
        }
    }
}

fn open_store(args: &GlobalArgs) -> Result<Store> {
    let mut config = StoreConfig::from_env().context("Invalid DOCVAULT_* environment")?;
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(ms) = args.lock_timeout_ms {
        config = config.with_lock_timeout(Duration::from_millis(ms));
    }
    if args.strict {
        config = config.with_decode_policy(DecodePolicy::Strict);
    }

    let data_dir = config.data_dir.clone();
    Store::open(config)
        .with_context(|| format!("Failed to open data directory: {}", data_dir.display()))
}

fn parse_object(json: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(json).context("Invalid JSON")? {
        Value::Object(object) => Ok(object),
        _ => bail!("Expected a JSON object"),
    }
}

/// JSON if it parses, otherwise the raw text as a string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

/// Import from JSON file
/// Format: { "collection_name": [records...], "document_name": {...}, ... }
///
/// Each collection is loaded in one transaction: a duplicate id anywhere in
/// it leaves that collection untouched.
fn import_data(store: &Store, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let data: Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in file: {}", file.display()))?;

    let mut total = 0;

    for (name, content) in data {
        match content {
            Value::Array(values) => {
                let mut incoming = Vec::with_capacity(values.len());
                for value in values {
                    let mut object = match value {
                        Value::Object(object) => object,
                        _ => bail!("Record in '{}' must be an object", name),
                    };
                    if !object.contains_key("id") {
                        object.insert("id".to_string(), Value::String(generate_id()));
                    }
                    let record = Record::from_map(object);
                    record.require_id()?;
                    incoming.push(record);
                }

                let imported = store
                    .collection(&name)?
                    .transact(|records| {
                        let count = incoming.len();
                        for record in incoming {
                            if let Some(id) = record.id() {
                                if records.iter().any(|r| r.has_id(id)) {
                                    return Err(VaultError::DuplicateId(id.to_string()));
                                }
                            }
                            records.push(record);
                        }
                        Ok(Commit::Write(count))
                    })
                    .with_context(|| format!("Failed to import collection {}", name))?;

                total += imported;
                println!("Imported {} records into '{}'", imported, name);
            }
            Value::Object(object) => {
                store
                    .document(&name)?
                    .write(Record::from_map(object))
                    .with_context(|| format!("Failed to write document {}", name))?;
                println!("Imported document '{}'", name);
            }
            _ => bail!("'{}' must be an array of records or a document object", name),
        }
    }

    println!("Total: {} records imported to {}", total, store.data_dir().display());
    Ok(())
}

/// Read one file under its lock and decode it by shape.
/// Singleton documents are stored as a bare object, collections as an array.
fn read_for_export(store: &Store, name: &str) -> Result<Option<Value>> {
    let path = store.file_path(name)?;
    let config = store.config();
    let lock = FileLock::acquire(&path, config.lock_timeout, config.poll_interval)?;

    let bytes = fs::read(&path)
        .with_context(|| format!("Failed to read collection: {}", name))?;
    let is_document = bytes.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{');

    let value = if is_document {
        codec::decode::<Option<Record>>(&bytes, &path, config.decode_policy)?
            .map(Record::into_value)
    } else {
        let records = codec::decode::<Vec<Record>>(&bytes, &path, config.decode_policy)?;
        Some(Value::Array(records.into_iter().map(Value::from).collect()))
    };

    lock.release()?;
    Ok(value)
}

/// Export collections and documents to JSON file
fn export_data(store: &Store, file: &Path, collection_filter: Option<&str>) -> Result<()> {
    let mut output: Map<String, Value> = Map::new();
    let mut total = 0;

    for name in store.list_names()? {
        if collection_filter.is_some_and(|filter| filter != name) {
            continue;
        }

        match read_for_export(store, &name)? {
            Some(Value::Array(records)) => {
                println!("Exporting {} records from '{}'", records.len(), name);
                total += records.len();
                output.insert(name, Value::Array(records));
            }
            Some(doc) => {
                println!("Exporting document '{}'", name);
                output.insert(name, doc);
            }
            None => {}
        }
    }

    let json =
        serde_json::to_string_pretty(&output).with_context(|| "Failed to serialize to JSON")?;
    fs::write(file, json)
        .with_context(|| format!("Failed to write to file: {}", file.display()))?;

    println!("Total: {} records exported to {}", total, file.display());
    Ok(())
}

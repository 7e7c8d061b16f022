// Inventory, back up and restore the storage of a device

use std::path::PathBuf;

use clap::{value_parser, Arg, Command};
use devstore::{
    archive::DEFAULT_ARCHIVE_NAME, backup::BackupArchiver, restore::RestoreEngine,
    ArchiveDocument,
};
use tracing_subscriber::EnvFilter;

mod common;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let matches = common::connection_args(Command::new("devstore"))
        .about("Manage the file storage of a device")
        .arg(
            Arg::new("about")
                .long("about")
                .help("Show about information")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(Command::new("list").about("Lists the files on the device"))
        .subcommand(
            Command::new("backup")
                .about("Downloads every listed file into one archive")
                .arg(
                    Arg::new("out")
                        .index(1)
                        .value_name("PATH")
                        .value_parser(value_parser!(PathBuf))
                        .help("Where to save the archive"),
                ),
        )
        .subcommand(
            Command::new("restore")
                .about("Writes the files of an archive back to the device")
                .arg(
                    Arg::new("archive")
                        .required(true)
                        .index(1)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(Command::new("free_space").about("Shows the free space on the device"))
        .subcommand(
            Command::new("delete")
                .about("Deletes a file on the device")
                .arg(Arg::new("path").required(true).index(1)),
        )
        .get_matches();

    if matches.get_flag("about") {
        println!("devstore - inventory, back up and restore device storage");
        return;
    }

    let session = match common::get_session(&matches) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    if matches.subcommand_matches("list").is_some() {
        session
            .refresh_catalog()
            .await
            .expect("Failed to list files");
        for path in session.catalog().files() {
            println!("{path}");
        }
        match session.free_space().await {
            Ok(space) => println!("Free space: {space} bytes"),
            Err(e) => eprintln!("Unable to read free space: {e}"),
        }
    } else if let Some(matches) = matches.subcommand_matches("backup") {
        let out = matches
            .get_one::<PathBuf>("out")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_NAME));

        session
            .refresh_catalog()
            .await
            .expect("Failed to list files");
        let archive = match BackupArchiver::new(&session)
            .run_with_progress(|p| async move {
                println!("[{}/{}] {}", p.completed, p.total, p.path);
            })
            .await
        {
            Ok(a) => a,
            Err(e) => {
                eprintln!("Could not complete backup: {e}");
                return;
            }
        };
        archive.save(&out).await.expect("Failed to write archive");
        println!("Backup successful! Saved {} files to {}", archive.len(), out.display());
    } else if let Some(matches) = matches.subcommand_matches("restore") {
        let path = matches
            .get_one::<PathBuf>("archive")
            .expect("No archive passed");
        let archive = match ArchiveDocument::load(path).await {
            Ok(a) => a,
            Err(e) => {
                eprintln!("Unable to read archive: {e}");
                return;
            }
        };

        println!("Beginning restore...");
        let res = RestoreEngine::new(&session)
            .restore_with_progress(&archive, |p| async move {
                println!("File {} restored ({}/{})", p.path, p.completed, p.total);
            })
            .await;
        match res {
            Ok(report) => {
                println!("Restore successful! {} files on the device", report.catalog_files);
                if let Some(space) = report.free_space {
                    println!("Free space: {space} bytes");
                }
            }
            Err(e) => eprintln!("Restore failed: {e}"),
        }
    } else if matches.subcommand_matches("free_space").is_some() {
        let space = session
            .free_space()
            .await
            .expect("Failed to get free space");
        println!("Free space: {space} bytes");
    } else if let Some(matches) = matches.subcommand_matches("delete") {
        let path = matches.get_one::<String>("path").expect("No path passed");
        let deleted = session.delete_file(path).await.expect("Failed to delete");
        println!("File deleted! {deleted}");
    } else {
        eprintln!("Invalid usage, pass -h for help");
    }
}

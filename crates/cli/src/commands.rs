use crate::{Command, fail};
use miette::{Result, miette};
use shelf_library::{BookQuery, Library, NewBook};
use shelf_model::{BookId, BookMetadata, data_url, decode_data_url};
use std::io::Write;
use std::path::Path;

fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("pdf") => "application/pdf",
        Some("epub") => "application/epub+zip",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

fn print_books(books: &[BookMetadata]) {
    if books.is_empty() {
        println!("No books.");
        return;
    }
    for book in books {
        println!(
            "{:<15} {:>3}%  {:<12} {} ({})",
            book.id.as_str(),
            book.progress,
            book.category.as_str(),
            book.title,
            book.author
        );
    }
}

fn print_book(book: &BookMetadata, has_content: bool) {
    println!("id:        {}", book.id);
    println!("title:     {}", book.title);
    println!("author:    {}", book.author);
    println!("category:  {}", book.category);
    println!("progress:  {}%", book.progress);
    if let Some(last_read) = book.last_read {
        println!("last read: {last_read}");
    }
    if let Some(file_name) = &book.file_name {
        println!("file:      {file_name}");
    }
    if !book.cover_url.is_empty() {
        println!("cover:     {}", book.cover_url);
    }
    println!("content:   {}", if has_content { "stored" } else { "none" });
}

pub(crate) async fn run(library: &Library, command: Command) -> Result<()> {
    match command {
        Command::List { search, category } => {
            let mut query = BookQuery::new();
            if let Some(search) = search {
                query = query.with_search(search);
            }
            if let Some(category) = category {
                query = query.with_category(category);
            }
            print_books(&library.search(&query).await.map_err(fail("listing books"))?);
        },
        Command::Recent { limit } => {
            print_books(&library.recent(limit).await.map_err(fail("listing books"))?);
        },
        Command::Stats => {
            for (category, count) in library.category_stats().await.map_err(fail("counting books"))? {
                println!("{:<12} {count}", category.as_str());
            }
        },
        Command::Add { file, title, author, category, cover } => {
            let bytes = tokio::fs::read(&file).await.map_err(fail("reading book file"))?;
            let mut upload = NewBook::new(title, author);
            upload.category = category;
            upload.cover_url = cover;
            upload.file_name = file.file_name().and_then(|n| n.to_str()).map(str::to_string);
            upload.content = Some(data_url(mime_type(&file), &bytes));
            let book = library.add_book(upload).await.map_err(fail("adding book"))?;
            println!("{}", book.id);
        },
        Command::Show { id } => {
            let book = library.get_book(&BookId::from(id.as_str())).await.map_err(fail("reading book"))?;
            let book = book.ok_or_else(|| miette!("no book with id `{id}`"))?;
            print_book(&book.metadata, book.content.is_some());
        },
        Command::Content { id, out } => {
            let content = library.get_book_content(&BookId::from(id.as_str())).await.map_err(fail("reading book"))?;
            let content = content.ok_or_else(|| miette!("book `{id}` has no stored file"))?;
            let (_, bytes) = decode_data_url(&content).map_err(fail("decoding stored file"))?;
            match out {
                Some(out) => tokio::fs::write(&out, &bytes).await.map_err(fail("writing file"))?,
                None => std::io::stdout().lock().write_all(&bytes).map_err(fail("writing file"))?,
            }
        },
        Command::Progress { id, percent } => {
            let book =
                library.record_progress(&BookId::from(id.as_str()), percent).await.map_err(fail("updating book"))?;
            let book = book.ok_or_else(|| miette!("no book with id `{id}`"))?;
            println!("{}: {}%", book.title, book.progress);
        },
        Command::Delete { id } => {
            library.delete_book(&BookId::from(id.as_str())).await.map_err(fail("deleting book"))?;
        },
        Command::Migrate => {
            let report = library.migrate_from_fallback().await;
            println!(
                "stored {} ({} with content), skipped {}, failed {}",
                report.stored(),
                report.with_content,
                report.skipped,
                report.failed
            );
        },
        Command::Export { out } => {
            let json = library.export_backup().await.map_err(fail("exporting backup"))?;
            match out {
                Some(out) => tokio::fs::write(&out, json).await.map_err(fail("writing backup"))?,
                None => println!("{json}"),
            }
        },
        Command::Import { file } => {
            let json = tokio::fs::read_to_string(&file).await.map_err(fail("reading backup"))?;
            let report = library.import_backup(&json).await.map_err(fail("importing backup"))?;
            println!("stored {}, skipped {}, failed {}", report.stored(), report.skipped, report.failed);
        },
    }
    Ok(())
}

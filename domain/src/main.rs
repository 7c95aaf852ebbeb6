use std::env;
use std::process;

use domain::adapters::memory_repo::InMemoryRepo;
use domain::service::{ListView, ShortenerService, SubmitStatus};
use domain::{Authenticator, CoreError, ShortenerConfig, SystemClock, UrlStore};

/// The demo has no admin surface.
struct NoAdmin;
impl Authenticator for NoAdmin {
    fn authenticate(&self, _username: &str, _password: &str) -> bool {
        false
    }
}

type DemoService = ShortenerService<InMemoryRepo, NoAdmin, SystemClock>;

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain submit <url> [--short <alias>] [<url> [--short <alias>] ...]\n  domain resolve <alias>\n  domain list [--long] [<url> [--short <alias>] ...]\n\nNotes:\n  - This demo CLI uses an in-memory store; data is not persisted across runs.\n  - Several submissions in one invocation share the same store.\n  - `list` submits the given URLs quietly, then prints every mapping.",
        domain::about()
    );
}

/// Split `<url> [--short <alias>] ...` into submissions.
fn parse_submissions(rest: &[String]) -> Result<Vec<(String, Option<String>)>, String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < rest.len() {
        let long = rest[i].clone();
        let mut custom = None;
        if rest.get(i + 1).map(String::as_str) == Some("--short") {
            let Some(val) = rest.get(i + 2) else {
                return Err("--short requires a value".into());
            };
            custom = Some(val.clone());
            i += 2;
        }
        i += 1;
        out.push((long, custom));
    }
    Ok(out)
}

/// Every mapping in the chosen orientation, sorted by key.
fn listing(svc: &DemoService, view: ListView) -> Result<Vec<(String, String)>, CoreError> {
    let rows = svc.store().list_all()?;
    let map: std::collections::BTreeMap<String, String> = match view {
        ListView::Short => rows.into_iter().map(|m| (m.short, m.long)).collect(),
        ListView::Long => rows.into_iter().map(|m| (m.long, m.short)).collect(),
    };
    Ok(map.into_iter().collect())
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    let svc = ShortenerService::new(
        InMemoryRepo::new(),
        NoAdmin,
        SystemClock,
        ShortenerConfig::default(),
    );

    match cmd.as_str() {
        "submit" => {
            let rest: Vec<String> = args.collect();
            if rest.is_empty() {
                return Err("missing <url> for submit".into());
            }
            for (long, custom) in parse_submissions(&rest)? {
                match svc.submit(&long, custom.as_deref()) {
                    Ok(sub) => {
                        let tag = match sub.status {
                            SubmitStatus::Created => "created",
                            SubmitStatus::PreExisting => "existing",
                        };
                        println!("{}: {} -> {}", tag, svc.short_url(&sub.short), long);
                    }
                    Err(e) => return Err(format!("submit failed: {}", e)),
                }
            }
            Ok(())
        }
        "resolve" => {
            let Some(short) = args.next() else {
                return Err("missing <alias> for resolve".into());
            };
            match svc.resolve(&short) {
                Ok(url) => {
                    println!("{}", url);
                    Ok(())
                }
                Err(CoreError::NotFound) => Err("not found".into()),
                Err(e) => Err(format!("resolve failed: {}", e)),
            }
        }
        "list" => {
            let mut rest: Vec<String> = args.collect();
            let view = if rest.first().map(String::as_str) == Some("--long") {
                rest.remove(0);
                ListView::Long
            } else {
                ListView::Short
            };
            for (long, custom) in parse_submissions(&rest)? {
                svc.submit(&long, custom.as_deref())
                    .map_err(|e| format!("submit failed for {}: {}", long, e))?;
            }
            let rows = listing(&svc, view).map_err(|e| format!("list failed: {}", e))?;
            if rows.is_empty() {
                println!("(no mappings)");
            }
            for (key, value) in rows {
                println!("{} -> {}", key, value);
            }
            Ok(())
        }
        other => {
            print_usage();
            Err(format!("unknown command {}", other))
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}

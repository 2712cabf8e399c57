use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

use serde::Serialize;

use forumdb::config::Config;
use forumdb::models::{Database, NewPost, Page, Related, SortMode, ThreadRef, User};
use forumdb::service::{ForumService, ThreadDraft};
use forumdb::store::{MemoryStore, Store};
use forumdb::{Error, Result};

fn cli() -> Command {
    Command::new("forumctl")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Inspect and administer a forumdb database")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .help("Config file to use"),
        )
        .arg(
            Arg::new("database-url")
                .short('u')
                .long("database-url")
                .value_name("URL")
                .num_args(1)
                .help("URL to use to connect to the database"),
        )
        .arg(
            Arg::new("memory")
                .short('m')
                .long("memory")
                .action(ArgAction::SetTrue)
                .help("Use a throwaway in-memory store instead of the database"),
        )
        .subcommand(Command::new("status").about("Count the rows of each entity"))
        .subcommand(Command::new("clear").about("Delete everything"))
        .subcommand(Command::new("check-config").about("Check configuration file for errors"))
        .subcommand(
            Command::new("generate-config").about("Print a config file with default values"),
        )
        .subcommand(
            Command::new("add-user")
                .about("Add a new user")
                .arg(required("nickname", 'n', "The user's nickname"))
                .arg(required("fullname", 'f', "The user's full name"))
                .arg(required("email", 'e', "The user's e-mail address"))
                .arg(
                    Arg::new("about")
                        .short('a')
                        .long("about")
                        .num_args(1)
                        .help("A short biography"),
                ),
        )
        .subcommand(
            Command::new("add-forum")
                .about("Add a new forum")
                .arg(required("slug", 's', "The forum's slug"))
                .arg(required("title", 't', "The forum's title"))
                .arg(required("user", 'u', "The nickname of the owner")),
        )
        .subcommand(
            Command::new("add-thread")
                .about("Start a new thread on a forum")
                .arg(required("forum", 'f', "The slug of the forum"))
                .arg(required("author", 'a', "The nickname of the author"))
                .arg(required("title", 't', "The thread's title"))
                .arg(required("message", 'm', "The opening message"))
                .arg(
                    Arg::new("slug")
                        .short('s')
                        .long("slug")
                        .num_args(1)
                        .help("The thread's slug; generated if not given"),
                ),
        )
        .subcommand(
            Command::new("add-posts")
                .about("Add a batch of posts to a thread")
                .arg(required("thread", 't', "The thread's ID or slug"))
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of posts to add, or - for stdin"),
                ),
        )
        .subcommand(
            Command::new("vote")
                .about("Vote on a thread")
                .arg(required("thread", 't', "The thread's ID or slug"))
                .arg(required("nickname", 'n', "The nickname of the voter"))
                .arg(
                    Arg::new("voice")
                        .short('v')
                        .long("voice")
                        .required(true)
                        .num_args(1)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i32))
                        .help("1 or -1"),
                ),
        )
        .subcommand(
            Command::new("posts")
                .about("List the posts of a thread")
                .arg(required("thread", 't', "The thread's ID or slug"))
                .arg(optional("limit", 'l', "How many posts to show"))
                .arg(optional("since", 's', "The ID of the post to start after"))
                .arg(optional("sort", 'o', "flat, tree or parent_tree"))
                .arg(
                    Arg::new("desc")
                        .short('d')
                        .long("desc")
                        .action(ArgAction::SetTrue)
                        .help("List in descending order"),
                ),
        )
        .subcommand(
            Command::new("post")
                .about("Show a post")
                .arg(
                    Arg::new("id")
                        .value_name("ID")
                        .required(true)
                        .value_parser(value_parser!(i32))
                        .help("The ID of the post"),
                )
                .arg(optional(
                    "related",
                    'r',
                    "Related objects to include: user, thread, forum",
                )),
        )
}

fn required(name: &'static str, short: char, help: &'static str) -> Arg {
    optional(name, short, help).required(true)
}

fn optional(name: &'static str, short: char, help: &'static str) -> Arg {
    Arg::new(name).short(short).long(name).num_args(1).help(help)
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .unwrap_or_default()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_posts(path: &Path) -> Result<Vec<NewPost>> {
    let mut data = String::new();

    if path.as_os_str() == "-" {
        std::io::stdin().read_to_string(&mut data)?;
    } else {
        let msg = format!("Couldn't open posts file at {}", path.display());
        File::open(path)
            .and_then(|mut file| file.read_to_string(&mut data))
            .map_err(|err| Error::from_io_error(err, msg))?;
    }

    Ok(serde_json::from_str(&data)?)
}

fn run<S: Store>(service: ForumService<S>, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("status", _)) => print_json(&service.status()?),
        Some(("clear", _)) => service.clear(),
        Some(("add-user", matches)) => print_json(&service.create_user(User {
            nickname: arg(matches, "nickname").to_owned(),
            fullname: arg(matches, "fullname").to_owned(),
            about: arg(matches, "about").to_owned(),
            email: arg(matches, "email").to_owned(),
        })?),
        Some(("add-forum", matches)) => print_json(&service.create_forum(
            arg(matches, "slug"),
            arg(matches, "title"),
            arg(matches, "user"),
        )?),
        Some(("add-thread", matches)) => {
            let draft = ThreadDraft {
                title: arg(matches, "title").to_owned(),
                author: arg(matches, "author").to_owned(),
                message: arg(matches, "message").to_owned(),
                slug: arg(matches, "slug").to_owned(),
                created: None,
            };

            print_json(&service.create_thread(arg(matches, "forum"), draft)?)
        }
        Some(("add-posts", matches)) => {
            let thread = ThreadRef::from(arg(matches, "thread"));
            let posts = match matches.get_one::<PathBuf>("file") {
                Some(path) => read_posts(path)?,
                None => Vec::new(),
            };

            print_json(&service.create_posts(&thread, posts)?)
        }
        Some(("vote", matches)) => {
            let thread = ThreadRef::from(arg(matches, "thread"));
            let voice = matches.get_one::<i32>("voice").copied().unwrap_or_default();

            print_json(&service.vote(&thread, arg(matches, "nickname"), voice)?)
        }
        Some(("posts", matches)) => {
            let thread = ThreadRef::from(arg(matches, "thread"));
            let desc = if matches.get_flag("desc") {
                Some("true")
            } else {
                None
            };
            let page = Page::from_query(
                matches.get_one::<String>("limit").map(String::as_str),
                matches.get_one::<String>("since").map(String::as_str),
                desc,
            );
            let sort = SortMode::from_query(matches.get_one::<String>("sort").map(String::as_str));

            print_json(&service.posts(&thread, &page, sort)?)
        }
        Some(("post", matches)) => {
            let id = matches.get_one::<i32>("id").copied().unwrap_or_default();
            let related =
                Related::from_query(matches.get_one::<String>("related").map(String::as_str));

            print_json(&service.post_full(id, related)?)
        }
        _ => Ok(()),
    }
}

fn main_res() -> Result<()> {
    let matches = cli().get_matches();

    if matches.subcommand_matches("generate-config").is_some() {
        return Config::generate(std::io::stdout());
    }

    let conf_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(Config::default_path);
    let memory = matches.get_flag("memory");

    let mut config = match Config::open(&conf_path) {
        Ok(config) => config,
        Err(_) if memory => Config::default(),
        Err(err) => return Err(err),
    };

    if let Some(url) = matches.get_one::<String>("database-url") {
        config.database_url = url.to_owned();
    }

    if matches.subcommand_matches("check-config").is_some() {
        // We've already loaded the config file, so we know it's good.
        println!("Configuration: {}", conf_path.display());
        println!("\nThe config file is good.");
        return Ok(());
    }

    forumdb::logger::init(&config)?;
    config.debug_log();

    if memory {
        run(ForumService::new(MemoryStore::new()), &matches)
    } else {
        run(ForumService::new(Database::open(&config)?), &matches)
    }
}

fn main() {
    if let Err(e) = main_res() {
        eprintln!("{}", e);
        std::process::exit(-1);
    }
}

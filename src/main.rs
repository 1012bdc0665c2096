use auth::store::TokenStore;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

pub mod auth;
mod bot;
mod cli;
mod commands;
mod dlive;
mod gateway;
mod listen;
mod options;

#[tokio::main]
async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = cli::Cli::parse();
    let options = match &args.options_file {
        Some(path) => options::Options::read(path)?,
        None => options::Options::default(),
    };
    init_tracing(&options);

    let store: Arc<dyn TokenStore> = if args.memory_store {
        Arc::new(auth::store::MemoryTokenStore::new())
    } else if let Some(var) = &args.env_store {
        Arc::new(auth::store::EnvTokenStore::new(var.clone()))
    } else {
        let path = args
            .store
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(auth::store::FileTokenStore::default_path);
        Arc::new(auth::store::FileTokenStore::new(path))
    };

    let redirect_uri = args
        .redirect
        .clone()
        .unwrap_or_else(|| String::from("http://localhost:3000/oauth/callback"));
    let token_manager = auth::access::TokenManager::new(
        auth::TokenManagerData {
            client_id: args.clientid.clone(),
            client_secret: args.clientsecret.clone(),
            redirect_uri,
            token_url: options.auth.token_url.clone(),
            request_timeout: options.request_timeout(),
        },
        store,
    )
    .await?;

    if args.reauth || !token_manager.has_refresh_token().await {
        let code = match &args.code {
            Some(code) => auth::AuthCode::new(code.clone()),
            None => {
                println!("No credential held. Starting server...");
                println!("Visit http://localhost:3000 to authorize the bot.");
                let server = auth::oauth::OAuthServer::start_auth(auth::OAuthServerData {
                    client_id: args.clientid.clone(),
                    authorize_url: options.auth.authorize_url.clone(),
                    scopes: options.auth.scopes.clone(),
                    host_address: String::from("localhost:3000"),
                    response_path: String::from("/oauth/callback"),
                });
                let code = server.into_inner().await??;
                println!("Success! Server closed.");
                code
            }
        };
        token_manager.complete_authorization(&code).await?;
        tracing::info!("authorization complete");
    }

    // DLive usernames are lowercase even when the display name is not.
    let streamer = args.channel.to_lowercase();

    let gateway = gateway::client::GatewayClient::new(
        token_manager.clone(),
        gateway::GatewayClientData {
            endpoint: options.gateway.endpoint.clone(),
            auth_scheme: options.gateway.auth_scheme.clone(),
            role_field: options.gateway.role_field.clone(),
            subscribing_field: options.gateway.subscribing_field.clone(),
            default_role: options.gateway.default_role.clone(),
            request_timeout: options.request_timeout(),
        },
    )?;

    let mut commands = commands::CommandTable::new();
    if options.features.seed_default_commands {
        commands.seed_defaults();
    }

    if !options.features.listener {
        tracing::info!("listener disabled by options; nothing left to do");
        return Ok(());
    }

    let listener = listen::client::ChatListener::new(listen::ListenerData {
        access: token_manager,
        streamer: streamer.clone(),
        endpoint: options.listen.endpoint.clone(),
        backoff: options.reconnect_delay(),
        connect_timeout: options.connect_timeout(),
    });

    let bot = bot::Bot::new(
        listener,
        gateway,
        commands,
        bot::BotData {
            bot_username: args
                .bot_user
                .clone()
                .unwrap_or_else(|| String::from("mrlarbin")),
            streamer,
        },
    );
    bot.run().await?;

    Ok(())
}

fn init_tracing(options: &options::Options) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if options.exec.debug {
            "larbin=debug"
        } else {
            "larbin=info"
        })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

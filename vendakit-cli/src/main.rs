//! Developer CLI for VendaKit.
//!
//! Drives the session, the client registry, and the two verification flows
//! against a live backend, implementing the host capability traits over the
//! local filesystem. Verification sessions run as a small prompt loop:
//! channel choice, digit entry with the countdown, resend, duplicate
//! resolution, and the post-commit offers.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::{bail, eyre, Result, WrapErr};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use vendakit_core::{
    download_sale_document, ApiClient, CapturedPhoto, Channel, Client, ClientForm,
    ClientRegistrationFlow, ClientRegistrationResult, Environment, FlowSnapshot, PhotoLibrary,
    PhotoSource, SaleForm, SaleKind, SalePrefill, SaleRegistrationFlow, SaleRegistrationResult,
    SessionManager, Stage, TerminalKind, User, DEFAULT_ROTA_NOME,
};

mod host;

use host::{DirDocumentSink, FileSessionStore, PathPhotoLibrary};

/// Developer CLI for the AgroVendas device core.
#[derive(Parser)]
#[command(name = "vendakit")]
#[command(about = "Drive the AgroVendas device core from a terminal")]
struct Cli {
    /// Backend environment (development | production)
    #[arg(long, env = "VENDAKIT_ENV", default_value = "development")]
    env: Environment,

    /// Explicit backend base URL, overriding the environment
    #[arg(long, env = "VENDAKIT_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and persist the session
    Login {
        /// Login e-mail
        email: String,

        /// Password; prompted when omitted
        #[arg(long)]
        senha: Option<String>,
    },
    /// Clear the persisted session
    Logout,
    /// Show the signed-in seller
    Whoami,
    /// Create a seller account
    Register {
        /// Display name
        nome: String,

        /// Login e-mail
        email: String,

        /// Password, minimum 6 characters; prompted when omitted
        #[arg(long)]
        senha: Option<String>,

        /// Account kind
        #[arg(long, default_value = "vendedor")]
        tipo: String,
    },
    /// Client registry commands
    Clientes {
        #[command(subcommand)]
        clientes_cmd: ClientesCommand,
    },
    /// Sale commands
    Vendas {
        #[command(subcommand)]
        vendas_cmd: VendasCommand,
    },
}

#[derive(Subcommand)]
enum ClientesCommand {
    /// List registered clients
    Listar {
        /// Filter by name or tax id
        #[arg(long)]
        busca: Option<String>,
    },
    /// Show one client
    Detalhes {
        /// Client id
        id: i64,
    },
    /// Register a client through the verification flow
    Cadastrar {
        /// Full name
        #[arg(long)]
        nome: String,

        /// CPF or CNPJ, with or without punctuation
        #[arg(long)]
        documento: String,

        /// Contact phone
        #[arg(long)]
        telefone: String,

        /// Street address
        #[arg(long)]
        endereco: String,

        /// Path to the document photo
        #[arg(long)]
        foto: PathBuf,
    },
}

#[derive(Subcommand)]
enum VendasCommand {
    /// Record a sale through the verification flow
    Criar {
        /// Backend id of the client the sale belongs to
        #[arg(long)]
        cliente_id: i64,

        /// Client name shown in the verification message
        #[arg(long)]
        cliente_nome: String,

        /// Phone the code is dispatched to
        #[arg(long)]
        cliente_telefone: String,

        /// Payment arrangement
        #[arg(long, default_value = "parcelado")]
        tipo: SaleKind,

        /// Amount, e.g. "1.500,00"
        #[arg(long)]
        valor: String,

        /// Installment count; ignored for cash kinds
        #[arg(long, default_value = "1")]
        parcelas: String,

        /// First due date, dd/mm/yyyy
        #[arg(long)]
        vencimento: String,

        /// Free-form description of what was sold
        #[arg(long)]
        descricao: String,

        /// Paper ficha number
        #[arg(long)]
        ficha: String,

        /// Path to the signed ficha photo
        #[arg(long)]
        foto: PathBuf,
    },
    /// Download the promissory document of a sale into the working directory
    Pdf {
        /// Sale id
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let store = FileSessionStore::at_default_path()?;
    let session = Arc::new(SessionManager::new(Arc::new(store)));
    session.restore().await;
    let api = Arc::new(match cli.api_url {
        Some(url) => ApiClient::with_base_url(url, Arc::clone(&session)),
        None => ApiClient::new(cli.env, Arc::clone(&session)),
    });

    match cli.command {
        Command::Login { email, senha } => cmd_login(&api, &session, email, senha).await,
        Command::Logout => cmd_logout(&session).await,
        Command::Whoami => cmd_whoami(&session).await,
        Command::Register {
            nome,
            email,
            senha,
            tipo,
        } => cmd_register(&api, nome, email, senha, tipo).await,
        Command::Clientes { clientes_cmd } => match clientes_cmd {
            ClientesCommand::Listar { busca } => cmd_clientes_listar(&api, busca).await,
            ClientesCommand::Detalhes { id } => cmd_clientes_detalhes(&api, id).await,
            ClientesCommand::Cadastrar {
                nome,
                documento,
                telefone,
                endereco,
                foto,
            } => {
                let form = ClientForm {
                    nome,
                    documento,
                    telefone,
                    endereco,
                    foto: Some(acquire_photo(&foto)?),
                };
                cmd_clientes_cadastrar(&api, &session, form).await
            }
        },
        Command::Vendas { vendas_cmd } => match vendas_cmd {
            VendasCommand::Criar {
                cliente_id,
                cliente_nome,
                cliente_telefone,
                tipo,
                valor,
                parcelas,
                vencimento,
                descricao,
                ficha,
                foto,
            } => {
                if !tipo.is_available() {
                    bail!("tipo de venda '{tipo}' ainda não disponível; use 'parcelado'");
                }
                let form = SaleForm {
                    cliente_id: Some(cliente_id),
                    cliente_nome,
                    cliente_telefone,
                    tipo,
                    valor,
                    parcelas,
                    data_vencimento: vencimento,
                    descricao,
                    numero_ficha: ficha,
                    foto: Some(acquire_photo(&foto)?),
                };
                let seller = require_seller(&session).await?;
                run_sale(&api, &seller, form).await
            }
            VendasCommand::Pdf { id } => cmd_vendas_pdf(&api, id).await,
        },
    }
}

async fn cmd_login(
    api: &ApiClient,
    session: &SessionManager,
    email: String,
    senha: Option<String>,
) -> Result<()> {
    let senha = match senha {
        Some(senha) => senha,
        None => prompt("senha: ")?,
    };
    let auth = api.authenticate(email, senha).await?;
    session.sign_in(auth.token, auth.user.clone()).await?;
    println!("✓ sessão iniciada como {} <{}>", auth.user.nome, auth.user.email);
    Ok(())
}

async fn cmd_logout(session: &SessionManager) -> Result<()> {
    session.sign_out().await;
    println!("✓ sessão encerrada");
    Ok(())
}

async fn cmd_whoami(session: &SessionManager) -> Result<()> {
    let Some(user) = session.current_user().await else {
        println!("não autenticado");
        return Ok(());
    };
    println!("{} <{}>", user.nome, user.email);
    println!("id:   {}", user.id);
    println!("tipo: {}", user.tipo);
    Ok(())
}

async fn cmd_register(
    api: &ApiClient,
    nome: String,
    email: String,
    senha: Option<String>,
    tipo: String,
) -> Result<()> {
    let senha = match senha {
        Some(senha) => senha,
        None => prompt("senha: ")?,
    };
    api.register(nome, email, senha, tipo).await?;
    println!("✓ conta criada; rode 'vendakit login' para entrar");
    Ok(())
}

async fn cmd_clientes_listar(api: &ApiClient, busca: Option<String>) -> Result<()> {
    let clients = api.list_clients(busca).await?;
    if clients.is_empty() {
        println!("nenhum cliente encontrado");
        return Ok(());
    }
    for client in clients {
        let id = client.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{id:>6}  {:<30}  {}",
            client.nome,
            client.documento.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_clientes_detalhes(api: &ApiClient, id: i64) -> Result<()> {
    let client = api.get_client(id).await?;
    print_client(&client);
    Ok(())
}

async fn cmd_clientes_cadastrar(
    api: &Arc<ApiClient>,
    session: &SessionManager,
    form: ClientForm,
) -> Result<()> {
    let seller = require_seller(session).await?;
    let flow = ClientRegistrationFlow::new(Arc::clone(api), seller.clone(), form)?;
    let result = drive_client_flow(&flow).await?;

    let id = result
        .client
        .id
        .map_or_else(|| "?".to_string(), |id| id.to_string());
    if result.used_existing {
        println!("✓ usando o cadastro existente de {} (id {id})", result.client.nome);
    } else {
        println!("✓ cliente {} cadastrado (id {id})", result.client.nome);
    }

    if confirm("criar uma venda para este cliente agora?")? {
        let Some(prefill) = flow.sale_prefill().await else {
            return Ok(());
        };
        let form = prompt_sale_form(&prefill)?;
        run_sale(api, &seller, form).await?;
    }
    Ok(())
}

async fn run_sale(api: &Arc<ApiClient>, seller: &User, form: SaleForm) -> Result<()> {
    let flow = SaleRegistrationFlow::new(Arc::clone(api), seller.clone(), form)?;
    let result = drive_sale_flow(&flow).await?;

    let id = result
        .venda_id
        .map_or_else(String::new, |id| format!(" (id {id})"));
    println!("✓ venda registrada{id}");

    if let Some(offer) = result.document {
        if confirm("baixar o documento da venda agora?")? {
            download_into_cwd(api, offer.venda_id).await?;
        }
    }
    Ok(())
}

async fn cmd_vendas_pdf(api: &Arc<ApiClient>, id: i64) -> Result<()> {
    download_into_cwd(api, id).await
}

async fn download_into_cwd(api: &Arc<ApiClient>, venda_id: i64) -> Result<()> {
    let cwd = std::env::current_dir().wrap_err("resolving the working directory")?;
    let sink = Arc::new(DirDocumentSink::new(cwd));
    let file_name = download_sale_document(Arc::clone(api), sink, venda_id).await?;
    println!("✓ documento salvo em ./{file_name}");
    Ok(())
}

async fn require_seller(session: &SessionManager) -> Result<User> {
    session
        .current_user()
        .await
        .ok_or_else(|| eyre!("não autenticado; rode 'vendakit login' primeiro"))
}

fn acquire_photo(path: &Path) -> Result<CapturedPhoto> {
    PathPhotoLibrary::new(path.to_path_buf())
        .acquire(PhotoSource::Gallery)?
        .ok_or_else(|| eyre!("captura de foto cancelada"))
}

/// What the operator asked for at the digit prompt.
enum CodeAction {
    Digits(Vec<u8>),
    Backspace,
    Resend,
    Quit,
}

async fn drive_client_flow(flow: &ClientRegistrationFlow) -> Result<ClientRegistrationResult> {
    let mut last_notice = None;
    loop {
        let snapshot = flow.poll_expiry().await;
        show_notice(&snapshot, &mut last_notice);
        match snapshot.stage {
            Stage::AwaitingChannelChoice => {
                let channel = ask_channel()?;
                note_flow_error(flow.choose_channel(channel).await);
            }
            Stage::AwaitingCode => {
                render_slots(&snapshot);
                match ask_code_action()? {
                    CodeAction::Digits(digits) => {
                        for digit in digits {
                            if let Err(err) = flow.enter_digit(digit).await {
                                println!("! {err}");
                                break;
                            }
                        }
                    }
                    CodeAction::Backspace => note_flow_error(flow.backspace().await),
                    CodeAction::Resend => note_flow_error(flow.resend().await),
                    CodeAction::Quit => bail!("operação cancelada"),
                }
            }
            Stage::ResolvingDuplicate => {
                if let Some(existing) = flow.conflict().await {
                    println!("já existe um cadastro com esses dados:");
                    print_client(&existing);
                }
                let accept = confirm("usar o cadastro existente?")?;
                note_flow_error(flow.resolve_duplicate(accept).await);
            }
            Stage::Terminal => break,
            // settled inside the flow driver, never rendered here
            Stage::Dispatching | Stage::Verifying | Stage::Committing => {}
        }
    }

    let snapshot = flow.snapshot().await;
    match snapshot.outcome {
        Some(TerminalKind::Success) => flow
            .result()
            .await
            .ok_or_else(|| eyre!("fluxo terminou sem um registro")),
        Some(TerminalKind::Expired) => bail!("código expirado; rode o cadastro novamente"),
        Some(TerminalKind::Failure) | None => {
            if let Some(notice) = snapshot.notice {
                bail!("cadastro não confirmado: {notice}");
            }
            bail!("cadastro não confirmado");
        }
    }
}

async fn drive_sale_flow(flow: &SaleRegistrationFlow) -> Result<SaleRegistrationResult> {
    let mut last_notice = None;
    loop {
        let snapshot = flow.poll_expiry().await;
        show_notice(&snapshot, &mut last_notice);
        match snapshot.stage {
            Stage::AwaitingChannelChoice => {
                let channel = ask_channel()?;
                note_flow_error(flow.choose_channel(channel).await);
            }
            Stage::AwaitingCode => {
                render_slots(&snapshot);
                match ask_code_action()? {
                    CodeAction::Digits(digits) => {
                        for digit in digits {
                            if let Err(err) = flow.enter_digit(digit).await {
                                println!("! {err}");
                                break;
                            }
                        }
                    }
                    CodeAction::Backspace => note_flow_error(flow.backspace().await),
                    CodeAction::Resend => note_flow_error(flow.resend().await),
                    CodeAction::Quit => bail!("operação cancelada"),
                }
            }
            Stage::Terminal => break,
            // sales never raise duplicates; the rest settle inside the flow
            Stage::Dispatching
            | Stage::Verifying
            | Stage::Committing
            | Stage::ResolvingDuplicate => {}
        }
    }

    let snapshot = flow.snapshot().await;
    match snapshot.outcome {
        Some(TerminalKind::Success) => flow
            .result()
            .await
            .ok_or_else(|| eyre!("fluxo terminou sem um registro")),
        Some(TerminalKind::Expired) => bail!("código expirado; inicie a venda novamente"),
        Some(TerminalKind::Failure) | None => {
            if let Some(notice) = snapshot.notice {
                bail!("venda não confirmada: {notice}");
            }
            bail!("venda não confirmada");
        }
    }
}

fn prompt_sale_form(prefill: &SalePrefill) -> Result<SaleForm> {
    println!(
        "venda para {} (telefone {})",
        prefill.nome, prefill.telefone
    );
    println!("rota: {DEFAULT_ROTA_NOME}");
    // Only the installment kind is offered for now.
    let valor = prompt("valor (ex.: 1.500,00): ")?;
    let parcelas = prompt("parcelas: ")?;
    let vencimento = prompt("primeiro vencimento (dd/mm/aaaa): ")?;
    let descricao = prompt("descrição: ")?;
    let ficha = prompt("número da ficha: ")?;
    let foto = prompt("caminho da foto da ficha: ")?;
    Ok(SaleForm {
        cliente_id: prefill.cliente_id,
        cliente_nome: prefill.nome.clone(),
        cliente_telefone: prefill.telefone.clone(),
        tipo: SaleKind::Parcelado,
        valor,
        parcelas,
        data_vencimento: vencimento,
        descricao,
        numero_ficha: ficha,
        foto: Some(acquire_photo(Path::new(&foto))?),
    })
}

fn ask_channel() -> Result<Channel> {
    loop {
        let line = prompt("canal de envio [1=whatsapp, 2=sms, q=cancelar]: ")?;
        match line.as_str() {
            "1" => return Ok(Channel::Whatsapp),
            "2" => return Ok(Channel::Sms),
            "q" => bail!("operação cancelada"),
            _ => {}
        }
    }
}

fn ask_code_action() -> Result<CodeAction> {
    loop {
        let line = prompt("dígitos [x=apagar, r=reenviar, q=cancelar]: ")?;
        match line.as_str() {
            "x" => return Ok(CodeAction::Backspace),
            "r" => return Ok(CodeAction::Resend),
            "q" => return Ok(CodeAction::Quit),
            other => {
                let digits: Vec<u8> = other
                    .chars()
                    .filter_map(|ch| ch.to_digit(10))
                    .filter_map(|digit| u8::try_from(digit).ok())
                    .collect();
                if !digits.is_empty() {
                    return Ok(CodeAction::Digits(digits));
                }
            }
        }
    }
}

fn render_slots(snapshot: &FlowSnapshot) {
    let mut line = String::new();
    for slot in &snapshot.slots {
        line.push('[');
        line.push(slot.map_or(' ', |digit| char::from(b'0' + digit)));
        line.push(']');
    }
    println!("{line}  restam {}s", snapshot.remaining_secs);
}

fn show_notice(snapshot: &FlowSnapshot, last: &mut Option<String>) {
    if snapshot.notice != *last {
        if let Some(notice) = &snapshot.notice {
            println!("! {notice}");
        }
        last.clone_from(&snapshot.notice);
    }
}

fn note_flow_error(outcome: Result<FlowSnapshot, vendakit_core::Error>) {
    if let Err(err) = outcome {
        println!("! {err}");
    }
}

fn print_client(client: &Client) {
    let id = client.id.map_or_else(|| "-".to_string(), |id| id.to_string());
    println!("id:        {id}");
    println!("nome:      {}", client.nome);
    println!("documento: {}", client.documento.as_deref().unwrap_or("-"));
    println!("telefone:  {}", client.telefone.as_deref().unwrap_or("-"));
    println!("endereço:  {}", client.endereco.as_deref().unwrap_or("-"));
    if let Some(email) = &client.email {
        println!("email:     {email}");
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush().wrap_err("flushing stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .wrap_err("reading stdin")?;
    Ok(line.trim().to_string())
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{question} [s/N]: "))?;
    Ok(answer.eq_ignore_ascii_case("s") || answer.eq_ignore_ascii_case("sim"))
}

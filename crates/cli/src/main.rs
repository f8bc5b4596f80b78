//
// Copyright (c) 2026 DIME Project Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: dime — end-to-end encrypted messaging core.
//

//! `dime` — generate keys, build and inspect signets, and seal/open DMIME
//! messages from the command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dime_core::dmime::{self, Actor, Draft};
use dime_core::keys::{KeyPair, KeysFile};
use dime_core::magic::{KeysFileType, SignetType};
use dime_core::parse::headers::CommonHeaders;
use dime_core::primitives::base64_decode;
use dime_core::signet::{ops, validate, Signet};
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser, Debug)]
#[command(name = "dime", version, about = "Signets, keys files, and DMIME messages")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a signing + encryption key pair and a matching signet/SSR.
    Keygen(KeygenArgs),
    /// Inspect or validate signets.
    #[command(subcommand)]
    Signet(SignetCommand),
    /// Seal or open DMIME messages.
    #[command(subcommand)]
    Message(MessageCommand),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum KeygenKind {
    User,
    Org,
}

#[derive(clap::Args, Debug)]
struct KeygenArgs {
    /// Whether to generate a user or organizational identity.
    #[arg(long = "type", value_enum)]
    kind: KeygenKind,

    /// Path prefix for the generated `<prefix>.keys.pem`/`<prefix>.signet.pem`.
    #[arg(long)]
    out_prefix: PathBuf,
}

#[derive(Subcommand, Debug)]
enum SignetCommand {
    /// Parse a signet PEM and print its field table and lattice state.
    Inspect {
        /// Path to the signet PEM file.
        path: PathBuf,
    },
    /// Run full cryptographic validation and print the resulting lattice level.
    Validate {
        /// Path to the signet PEM file.
        path: PathBuf,

        /// Hex-encoded Ed25519 public key file trusted as a DIME record root.
        /// May be repeated; an empty set skips the POK-trust check.
        #[arg(long = "pok")]
        pok: Vec<PathBuf>,

        /// The earlier signet this one's chain-of-custody or id-signature
        /// should verify against (previous identity for a user signet's
        /// chain of custody, or the issuing org signet for its id-signature).
        #[arg(long)]
        previous: Option<PathBuf>,
    },
    /// Countersign a signet-signing request with an organizational key,
    /// upgrading it to a user signet.
    SignSsr {
        /// Path to the SSR PEM to countersign.
        #[arg(long)]
        ssr: PathBuf,

        /// Path to the organization's keys file.
        #[arg(long)]
        org_keys: PathBuf,

        /// Where to write the resulting user signet PEM.
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum MessageCommand {
    /// Build a draft from a JSON description and seal it into a wire file.
    Seal {
        /// Path to the draft description JSON.
        #[arg(long)]
        draft: PathBuf,

        /// Path to the author's keys file.
        #[arg(long)]
        author_keys: PathBuf,

        /// Where to write the sealed `.dmsg` wire file.
        #[arg(long)]
        out: PathBuf,
    },
    /// Run the receive path for a given role and print the recovered
    /// headers and body.
    Open {
        /// Path to the sealed `.dmsg` wire file.
        #[arg(long = "in")]
        input: PathBuf,

        /// Which participant is opening the message.
        #[arg(long = "as", value_enum)]
        as_role: ActorArg,

        /// Path to that participant's keys file.
        #[arg(long)]
        keys: PathBuf,

        /// External signets required by the chosen role. The recipient role
        /// needs exactly two, in order: the author's signet, then the
        /// origin's signet (to verify the author's content signature and
        /// the origin's bounce signature). Author/origin/destination need
        /// none.
        #[arg(long = "signet")]
        signet: Vec<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ActorArg {
    Author,
    Origin,
    Destination,
    Recipient,
}

impl From<ActorArg> for Actor {
    fn from(a: ActorArg) -> Self {
        match a {
            ActorArg::Author => Actor::Author,
            ActorArg::Origin => Actor::Origin,
            ActorArg::Destination => Actor::Destination,
            ActorArg::Recipient => Actor::Recipient,
        }
    }
}

/// The small envelope/header/body description `message seal` reads. Signet
/// fingerprints are not part of this input: the caller computes each one's
/// own fingerprint (id, falling back to full, falling back to crypto) from
/// the signet file itself.
#[derive(Deserialize, Debug)]
struct DraftDescription {
    author_id: String,
    origin_domain: String,
    destination_domain: String,
    recipient_id: String,
    author_signet: PathBuf,
    origin_signet: PathBuf,
    destination_signet: PathBuf,
    recipient_signet: PathBuf,
    headers: HeadersDescription,
    #[serde(default)]
    other_headers: Option<String>,
    #[serde(default)]
    display: Vec<String>,
    #[serde(default)]
    attach: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct HeadersDescription {
    date: String,
    to: String,
    #[serde(default)]
    cc: Option<String>,
    from: String,
    #[serde(default)]
    organization: Option<String>,
    subject: String,
}

impl From<HeadersDescription> for CommonHeaders {
    fn from(h: HeadersDescription) -> Self {
        CommonHeaders {
            date: h.date,
            to: h.to,
            cc: h.cc,
            from: h.from,
            organization: h.organization,
            subject: h.subject,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Keygen(args) => handle_keygen(args),
        Command::Signet(cmd) => match cmd {
            SignetCommand::Inspect { path } => handle_signet_inspect(&path),
            SignetCommand::Validate { path, pok, previous } => {
                handle_signet_validate(&path, &pok, previous.as_deref())
            }
            SignetCommand::SignSsr { ssr, org_keys, out } => {
                handle_signet_sign_ssr(&ssr, &org_keys, &out)
            }
        },
        Command::Message(cmd) => match cmd {
            MessageCommand::Seal { draft, author_keys, out } => {
                handle_message_seal(&draft, &author_keys, &out)
            }
            MessageCommand::Open { input, as_role, keys, signet } => {
                handle_message_open(&input, as_role, &keys, &signet)
            }
        },
    }
}

fn handle_keygen(args: KeygenArgs) -> Result<()> {
    let pair = KeyPair::generate();
    let verifying_key = pair.verifying_key();
    let encryption_public = pair.encryption_public();

    let keys_kind = match args.kind {
        KeygenKind::User => KeysFileType::User,
        KeygenKind::Org => KeysFileType::Organizational,
    };
    let keys_file = KeysFile::new(keys_kind, pair);

    let keys_path = suffixed(&args.out_prefix, "keys.pem");
    let signet_path = suffixed(&args.out_prefix, "signet.pem");

    println!("● generating {} key pair", kind_label(args.kind));
    keys_file
        .write_to_file(&keys_path)
        .with_context(|| format!("failed to write {}", keys_path.display()))?;
    println!("✔ keys written to {}", keys_path.display());

    match args.kind {
        KeygenKind::User => {
            let mut ssr = Signet::create(SignetType::Ssr);
            ops::signkey_set(&mut ssr, &verifying_key)?;
            ops::enckey_set(&mut ssr, &encryption_public)?;
            ops::sig_ssr_sign(&mut ssr, keys_file.pair.signing_key())?;
            ssr.file_create(&signet_path)
                .with_context(|| format!("failed to write {}", signet_path.display()))?;
        }
        KeygenKind::Org => {
            let mut org = Signet::create(SignetType::Organizational);
            ops::signkey_set(&mut org, &verifying_key)?;
            ops::enckey_set(&mut org, &encryption_public)?;
            ops::sig_crypto_sign(&mut org, keys_file.pair.signing_key())?;
            org.file_create(&signet_path)
                .with_context(|| format!("failed to write {}", signet_path.display()))?;
        }
    }
    println!("✔ signet written to {}", signet_path.display());
    Ok(())
}

fn kind_label(kind: KeygenKind) -> &'static str {
    match kind {
        KeygenKind::User => "user",
        KeygenKind::Org => "organizational",
    }
}

fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn handle_signet_inspect(path: &Path) -> Result<()> {
    let sig = Signet::signet_load(path).with_context(|| format!("failed to load {}", path.display()))?;

    println!("type: {:?}", sig.signet_type());
    println!("fields:");
    for field in sig.fields() {
        match &field.name {
            Some(name) => println!(
                "  fid {:>3}  {:>4} bytes  name={}",
                field.fid,
                field.data.len(),
                String::from_utf8_lossy(name)
            ),
            None => println!("  fid {:>3}  {:>4} bytes", field.fid, field.data.len()),
        }
    }

    let index = sig.field_index()?;
    println!("flight-check index (nonzero entries):");
    for (fid, offset) in index.iter().enumerate() {
        if *offset != 0 {
            println!("  fid {fid:>3} -> offset {}", offset - 1);
        }
    }

    println!("structural state: {:?}", validate::validate_structure(&sig));
    Ok(())
}

fn handle_signet_validate(path: &Path, pok_paths: &[PathBuf], previous: Option<&Path>) -> Result<()> {
    let sig = Signet::signet_load(path).with_context(|| format!("failed to load {}", path.display()))?;

    let mut dime_pok = Vec::with_capacity(pok_paths.len());
    for pok_path in pok_paths {
        let text = std::fs::read_to_string(pok_path)
            .with_context(|| format!("failed to read {}", pok_path.display()))?;
        let bytes = hex::decode(text.trim())
            .with_context(|| format!("{} is not valid hex", pok_path.display()))?;
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("{} is not a 32-byte Ed25519 public key", pok_path.display()))?;
        let key = VerifyingKey::from_bytes(&raw)
            .with_context(|| format!("{} is not a valid Ed25519 public key", pok_path.display()))?;
        dime_pok.push(key);
    }

    // The CLI exposes only one external-signet pointer; it serves as both
    // the chain-of-custody predecessor and the issuing-org signet for an
    // id-signature check. A fuller tool would split these roles.
    let previous_sig = previous
        .map(Signet::signet_load)
        .transpose()
        .with_context(|| "failed to load --previous signet")?;

    match validate::validate_all(&sig, previous_sig.as_ref(), previous_sig.as_ref(), &dime_pok) {
        Ok(state) => {
            println!("✔ lattice state: {state:?}");
            Ok(())
        }
        Err(err) => {
            eprintln!("✘ validation failed: {err}");
            process::exit(1);
        }
    }
}

fn handle_signet_sign_ssr(ssr_path: &Path, org_keys_path: &Path, out_path: &Path) -> Result<()> {
    let mut ssr = Signet::signet_load(ssr_path).with_context(|| format!("failed to load {}", ssr_path.display()))?;
    let org_keys = KeysFile::load_from_file(org_keys_path)
        .with_context(|| format!("failed to load {}", org_keys_path.display()))?;

    println!("● countersigning SSR with organizational key");
    ops::sig_crypto_sign(&mut ssr, org_keys.pair.signing_key())?;
    ssr.file_create(out_path).with_context(|| format!("failed to write {}", out_path.display()))?;
    println!("✔ user signet written to {}", out_path.display());
    Ok(())
}

fn signet_fingerprint(sig: &Signet) -> Option<String> {
    sig.fingerprint_id()
        .or_else(|_| sig.fingerprint_full())
        .or_else(|_| sig.fingerprint_crypto())
        .ok()
}

fn handle_message_seal(draft_path: &Path, author_keys_path: &Path, out_path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(draft_path)
        .with_context(|| format!("failed to read {}", draft_path.display()))?;
    let description: DraftDescription =
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", draft_path.display()))?;

    let author_signet = Signet::signet_load(&description.author_signet)
        .with_context(|| format!("failed to load {}", description.author_signet.display()))?;
    let origin_signet = Signet::signet_load(&description.origin_signet)
        .with_context(|| format!("failed to load {}", description.origin_signet.display()))?;
    let destination_signet = Signet::signet_load(&description.destination_signet)
        .with_context(|| format!("failed to load {}", description.destination_signet.display()))?;
    let recipient_signet = Signet::signet_load(&description.recipient_signet)
        .with_context(|| format!("failed to load {}", description.recipient_signet.display()))?;

    let author_fp = signet_fingerprint(&author_signet);
    let origin_fp = signet_fingerprint(&origin_signet);
    let destination_fp = signet_fingerprint(&destination_signet);
    let recipient_fp = signet_fingerprint(&recipient_signet);

    let mut draft = Draft::create(Actor::Author);
    draft.set_envelope(
        description.author_id,
        description.origin_domain,
        description.destination_domain,
        description.recipient_id,
        author_fp,
        origin_fp,
        destination_fp,
        recipient_fp,
    );
    draft.attach_signets(
        Some(author_signet),
        Some(origin_signet),
        Some(destination_signet),
        Some(recipient_signet),
    );
    draft.set_headers(description.headers.into());
    if let Some(other) = description.other_headers {
        draft.set_other_headers(other.into_bytes());
    }
    for line in description.display {
        draft.add_display(line.into_bytes());
    }
    for encoded in description.attach {
        let bytes = base64_decode(&encoded).with_context(|| "failed to decode an attach entry as base64")?;
        draft.add_attach(bytes);
    }
    draft.finalize().context("draft is incomplete")?;

    let author_keys = KeysFile::load_from_file(author_keys_path)
        .with_context(|| format!("failed to load {}", author_keys_path.display()))?;

    println!("● sealing message");
    let msg = dmime::assemble(&draft, author_keys.pair.signing_key())?;
    let wire = msg.serialize(dmime::SectionMask::ALL, false);
    std::fs::write(out_path, &wire).with_context(|| format!("failed to write {}", out_path.display()))?;
    println!("✔ sealed message written to {} ({} bytes)", out_path.display(), wire.len());
    Ok(())
}

fn handle_message_open(input_path: &Path, as_role: ActorArg, keys_path: &Path, signets: &[PathBuf]) -> Result<()> {
    let wire = std::fs::read(input_path).with_context(|| format!("failed to read {}", input_path.display()))?;
    let msg = dmime::Message::deserialize(&wire).context("failed to parse message")?;
    let keys = KeysFile::load_from_file(keys_path).with_context(|| format!("failed to load {}", keys_path.display()))?;

    let draft = match as_role {
        ActorArg::Author => {
            let envelope = dmime::envelope_decrypt(&msg, Actor::Author, keys.pair.encryption_secret())?;
            dmime::message_decrypt_as_author(&msg, envelope, keys.pair.encryption_secret(), &keys.pair.verifying_key())?
        }
        ActorArg::Origin => dmime::message_decrypt_as_origin(&msg, keys.pair.encryption_secret())?,
        ActorArg::Destination => dmime::message_decrypt_as_destination(&msg, keys.pair.encryption_secret())?,
        ActorArg::Recipient => {
            if signets.len() != 2 {
                bail!("--as recipient requires exactly two --signet paths: the author's, then the origin's");
            }
            let author_signet = Signet::signet_load(&signets[0])
                .with_context(|| format!("failed to load {}", signets[0].display()))?;
            let origin_signet = Signet::signet_load(&signets[1])
                .with_context(|| format!("failed to load {}", signets[1].display()))?;
            let author_key = ops::signkey_fetch(&author_signet)?;
            let origin_key = ops::signkey_fetch(&origin_signet)?;
            let envelope = dmime::envelope_decrypt(&msg, Actor::Recipient, keys.pair.encryption_secret())?;
            dmime::message_decrypt_as_recipient(&msg, envelope, keys.pair.encryption_secret(), &author_key, &origin_key)?
        }
    };

    print_draft(&draft);
    Ok(())
}

fn print_draft(draft: &Draft) {
    println!("state: {:?}", draft.state);
    if let Some(id) = &draft.author_id {
        println!("author: {id}");
    }
    if let Some(id) = &draft.recipient_id {
        println!("recipient: {id}");
    }
    if let Some(domain) = &draft.origin_domain {
        println!("origin domain: {domain}");
    }
    if let Some(domain) = &draft.destination_domain {
        println!("destination domain: {domain}");
    }
    if let Some(headers) = &draft.common_headers {
        println!("Date: {}", headers.date);
        println!("To: {}", headers.to);
        if let Some(cc) = &headers.cc {
            println!("Cc: {cc}");
        }
        println!("From: {}", headers.from);
        if let Some(org) = &headers.organization {
            println!("Organization: {org}");
        }
        println!("Subject: {}", headers.subject);
    }
    for (i, chunk) in draft.display.iter().enumerate() {
        match std::str::from_utf8(chunk) {
            Ok(text) => println!("--- display {i} ---\n{text}"),
            Err(_) => println!("--- display {i} ({} bytes, binary) ---", chunk.len()),
        }
    }
    for (i, chunk) in draft.attach.iter().enumerate() {
        println!("--- attach {i} ({} bytes) ---", chunk.len());
    }
}

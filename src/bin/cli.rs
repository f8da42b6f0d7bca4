use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use env_logger::{Builder, Env};

use mpegts_core::constants::{PID_PAT, PKT_SIZE, TID_PAT};
use mpegts_core::continuity::{ContinuityAnalyzer, ContinuityOptions};
use mpegts_core::network::UdpInput;
use mpegts_core::packet::{PidSet, TsPacket};
use mpegts_core::psi::{BinaryTable, Pat, Section};
use mpegts_core::report::{LogReport, Report, Summary};

#[derive(Parser)]
#[command(name = "tscc", about = "Check and fix MPEG-TS continuity counters")]
struct Opt {
    /// TS file to analyze
    #[arg(long, conflicts_with = "udp", required_unless_present = "udp")]
    input: Option<PathBuf>,

    /// UDP socket to bind + listen (IPv4, unicast or multicast)
    #[arg(long)]
    udp: Option<SocketAddr>,

    /// Local interface for multicast reception
    #[arg(long, requires = "udp")]
    iface: Option<Ipv4Addr>,

    /// Write the (possibly repaired) stream to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// PIDs to check, comma separated, decimal or 0x-hex (default: all)
    #[arg(long, value_delimiter = ',', value_parser = parse_pid)]
    pids: Vec<u16>,

    /// Rewrite CC on discontinuities
    #[arg(long)]
    fix: bool,

    /// Regenerate all CC from scratch
    #[arg(long, conflicts_with = "fix")]
    generator: bool,

    /// Do not report each discontinuity
    #[arg(long)]
    quiet: bool,

    /// JSON file with analyzer options (flags above take precedence)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refresh interval of the JSON summary in UDP mode, in seconds
    #[arg(long, default_value_t = 2)]
    refresh: u64,

    /// More logs (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_pid(s: &str) -> Result<u16, String> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    }
    .map_err(|e| format!("invalid PID {s:?}: {e}"))?;
    if value > 0x1FFF {
        return Err(format!("PID {value:#X} out of range"));
    }
    Ok(value)
}

/// Per-packet work: PAT tracking, continuity check, output.
struct Pipeline {
    analyzer: ContinuityAnalyzer,
    mutate: bool,
    pat_table: BinaryTable,
    pat: Option<Pat>,
    output: Option<BufWriter<File>>,
}

impl Pipeline {
    fn new(opt: &Opt) -> anyhow::Result<Self> {
        let mut options = match &opt.config {
            Some(path) => load_options(path)?,
            None => ContinuityOptions { display: true, ..Default::default() },
        };
        options.fix |= opt.fix;
        options.generator |= opt.generator;
        if opt.quiet {
            options.display = false;
        }
        let mutate = options.fix || options.generator;

        let filter = if opt.pids.is_empty() {
            PidSet::all()
        } else {
            opt.pids.iter().copied().collect()
        };
        let report: Box<dyn Report> = Box::new(LogReport::default());
        let mut analyzer = ContinuityAnalyzer::new(filter, Some(report));
        analyzer.apply_options(options);

        let output = match &opt.output {
            Some(path) => Some(BufWriter::new(
                File::create(path).with_context(|| format!("creating {}", path.display()))?,
            )),
            None => None,
        };
        if mutate && output.is_none() {
            log::warn!("--fix/--generator without --output: repaired packets are discarded");
        }

        Ok(Self { analyzer, mutate, pat_table: BinaryTable::new(), pat: None, output })
    }

    fn process(&mut self, mut pkt: TsPacket) -> anyhow::Result<()> {
        if pkt.pid() == PID_PAT && pkt.pusi() {
            self.collect_pat(&pkt);
        }
        if self.mutate {
            self.analyzer.feed_packet_mut(&mut pkt);
        } else {
            self.analyzer.feed_packet(&pkt);
        }
        if let Some(out) = &mut self.output {
            out.write_all(pkt.as_bytes())?;
        }
        Ok(())
    }

    /// Only sections starting and ending in one packet are considered.
    fn collect_pat(&mut self, pkt: &TsPacket) {
        let section = match Section::from_ts_payload(pkt.payload()) {
            Ok(s) if s.table_id == TID_PAT => s,
            Ok(s) => {
                log::debug!("PID 0: unexpected table id 0x{:02X}", s.table_id);
                return;
            }
            Err(e) => {
                log::debug!("PID 0: {e}");
                return;
            }
        };

        if self.pat_table.add_section(section.clone()).is_err() {
            // new version or layout, restart collection
            self.pat_table.clear();
            if let Err(e) = self.pat_table.add_section(section) {
                log::debug!("PID 0: {e}");
                return;
            }
        }
        if !self.pat_table.is_complete() {
            return;
        }
        match Pat::from_table(&self.pat_table) {
            Ok(pat) => {
                if self.pat.as_ref() != Some(&pat) {
                    log::info!("{}", pat.display().trim_end());
                    self.pat = Some(pat);
                }
            }
            Err(e) => log::debug!("PID 0: {e}"),
        }
    }

    fn summary(&self) -> Summary {
        Summary::new(self.analyzer.stats(), self.pat.clone())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(out) = &mut self.output {
            out.flush()?;
        }
        Ok(())
    }
}

fn load_options(path: &Path) -> anyhow::Result<ContinuityOptions> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn run_file(pipeline: &mut Pipeline, path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut buf = [0u8; PKT_SIZE];
    let mut index = 0u64;
    loop {
        match reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        match TsPacket::from_slice(&buf) {
            Ok(pkt) => pipeline.process(pkt)?,
            Err(e) => log::warn!("packet {index}: {e}, skipped"),
        }
        index += 1;
    }
    pipeline.finish()?;
    println!("{}", pipeline.summary().to_json());
    Ok(())
}

async fn run_udp(pipeline: &mut Pipeline, addr: SocketAddr, iface: Option<Ipv4Addr>, refresh: u64) -> anyhow::Result<()> {
    let mut input = UdpInput::bind(addr, iface).with_context(|| format!("binding {addr}"))?;
    let mut ticker = tokio::time::interval(Duration::from_secs(refresh.max(1)));
    ticker.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            packets = input.recv_packets() => {
                for pkt in packets? {
                    pipeline.process(pkt)?;
                }
            }
            _ = ticker.tick() => {
                println!("{}", pipeline.summary().to_json());
            }
            _ = &mut ctrl_c => {
                log::info!("interrupted, {} datagrams received", input.datagrams());
                break;
            }
        }
    }
    pipeline.finish()?;
    println!("{}", pipeline.summary().to_json());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let level = match opt.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    Builder::from_env(Env::default().default_filter_or(level)).init();

    let mut pipeline = Pipeline::new(&opt)?;
    match (&opt.input, opt.udp) {
        (Some(path), _) => run_file(&mut pipeline, path),
        (None, Some(addr)) => run_udp(&mut pipeline, addr, opt.iface, opt.refresh).await,
        (None, None) => anyhow::bail!("either --input or --udp is required"),
    }
}

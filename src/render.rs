use crate::config::Thresholds;
use crate::snapshot::{CpuStats, DiskStats, MemoryStats, NetworkStats, Snapshot};
use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

const CLEAR_SCREEN: &str = "\x1b[2J";
const HOME: &str = "\x1b[H";
const RESET: &str = "\x1b[0m";
const BOLD_CYAN: &str = "\x1b[1;36m";
const BOLD_YELLOW: &str = "\x1b[1;33m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

pub trait Renderer: Send {
    fn render(&mut self, snapshot: &Snapshot) -> io::Result<()>;
    fn clear(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

pub struct JsonRenderer<W> {
    writer: W,
}

impl<W: Write + Send> JsonRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> Renderer for JsonRenderer<W> {
    fn render(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn clear(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

pub struct TerminalRenderer<W> {
    writer: W,
    thresholds: Thresholds,
    ansi: bool,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout(thresholds: Thresholds) -> Self {
        let stdout = io::stdout();
        let ansi = stdout.is_terminal();
        Self::new(stdout, thresholds, ansi)
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(writer: W, thresholds: Thresholds, ansi: bool) -> Self {
        Self {
            writer,
            thresholds,
            ansi,
        }
    }

    fn format(&self, snapshot: &Snapshot) -> String {
        let mut out = String::new();
        if self.ansi {
            out.push_str(CLEAR_SCREEN);
            out.push_str(HOME);
        } else {
            let _ = writeln!(out, "\n{}", "=".repeat(80));
        }

        let title = self.paint(BOLD_CYAN, "System Monitor");
        let _ = writeln!(
            out,
            "{title} - {}\n",
            humantime::format_rfc3339_seconds(snapshot.timestamp)
        );
        self.format_cpu(&mut out, &snapshot.cpu);
        self.format_memory(&mut out, &snapshot.memory);
        self.format_disks(&mut out, &snapshot.disk);
        self.format_network(&mut out, &snapshot.network);
        out
    }

    fn format_cpu(&self, out: &mut String, cpu: &CpuStats) {
        self.header(out, "CPU Usage:");
        if cpu.per_core.is_empty() && cpu.overall == 0.0 {
            out.push_str("  no data\n\n");
            return;
        }
        let line = format!("  Overall: {:6.2}%", cpu.overall);
        out.push_str(&self.level(line, cpu.overall, self.thresholds.cpu));
        if !cpu.per_core.is_empty() {
            out.push_str("  Per Core:\n");
            for (i, pct) in cpu.per_core.iter().enumerate() {
                let line = format!("    Core {i:2}: {pct:6.2}%");
                out.push_str(&self.level(line, *pct, self.thresholds.cpu));
            }
        }
        out.push('\n');
    }

    fn format_memory(&self, out: &mut String, mem: &MemoryStats) {
        self.header(out, "Memory Usage:");
        if mem.total == 0 {
            out.push_str("  no data\n\n");
            return;
        }
        let line = format!("  Usage:     {:6.2}%", mem.percent);
        out.push_str(&self.level(line, mem.percent, self.thresholds.memory));
        let _ = writeln!(out, "  Total:     {:8.2} GB", mem.total as f64 / GIB);
        let _ = writeln!(out, "  Used:      {:8.2} GB", mem.used as f64 / GIB);
        let _ = writeln!(out, "  Available: {:8.2} GB\n", mem.available as f64 / GIB);
    }

    fn format_disks(&self, out: &mut String, disks: &[DiskStats]) {
        self.header(out, "Disk Usage:");
        if disks.is_empty() {
            out.push_str("  no data\n\n");
            return;
        }
        for disk in disks {
            let _ = writeln!(out, "  {}", disk.mountpoint);
            let line = format!("    Usage:     {:6.2}%", disk.percent);
            out.push_str(&self.level(line, disk.percent, self.thresholds.disk));
            let _ = writeln!(out, "    Total:     {:8.2} GB", disk.total as f64 / GIB);
            let _ = writeln!(out, "    Used:      {:8.2} GB", disk.used as f64 / GIB);
            let _ = writeln!(out, "    Available: {:8.2} GB", disk.available as f64 / GIB);
        }
        out.push('\n');
    }

    fn format_network(&self, out: &mut String, nets: &[NetworkStats]) {
        self.header(out, "Network I/O:");
        if nets.is_empty() {
            out.push_str("  no data\n\n");
            return;
        }
        for net in nets {
            let _ = writeln!(out, "  {}", net.interface);
            let _ = writeln!(
                out,
                "    Sent:     {} ({}/s)",
                format_bytes(net.bytes_sent),
                format_bytes(net.send_rate as u64)
            );
            let _ = writeln!(
                out,
                "    Received: {} ({}/s)",
                format_bytes(net.bytes_recv),
                format_bytes(net.recv_rate as u64)
            );
        }
        out.push('\n');
    }

    fn header(&self, out: &mut String, title: &str) {
        let _ = writeln!(out, "{}", self.paint(BOLD_YELLOW, title));
    }

    // yellow from 80 % of the threshold
    fn level(&self, mut line: String, value: f64, threshold: f64) -> String {
        if value > threshold {
            line.push(' ');
            line.push_str(if self.ansi { "⚠ WARNING" } else { "[WARNING]" });
        }
        let color = if value > threshold {
            RED
        } else if value > threshold * 0.8 {
            YELLOW
        } else {
            GREEN
        };
        format!("{}\n", self.paint(color, &line))
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.ansi {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        let text = self.format(snapshot);
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()
    }

    fn clear(&mut self) -> io::Result<()> {
        if self.ansi {
            self.writer.write_all(CLEAR_SCREEN.as_bytes())?;
            self.writer.write_all(HOME.as_bytes())?;
        }
        self.writer.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        if self.ansi {
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.2} {suffix}B", bytes as f64 / div as f64)
}

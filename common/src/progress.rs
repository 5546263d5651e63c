use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicU64,
}

impl Counter {
    pub fn add(&self, value: u64) {
        self.count.fetch_add(value, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Live counters updated by the transfer driver while it works through the entry list.
#[derive(Debug)]
pub struct Progress {
    pub entries_total: Counter,
    pub entries_done: Counter,
    pub bytes_copied: Counter,
    pub files_copied: Counter,
    pub directories_created: Counter,
    pub directories_unchanged: Counter,
    pub failures: Counter,
    start_time: std::time::Instant,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            entries_total: Default::default(),
            entries_done: Default::default(),
            bytes_copied: Default::default(),
            files_copied: Default::default(),
            directories_created: Default::default(),
            directories_unchanged: Default::default(),
            failures: Default::default(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn get_duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProgressPrinter<'a> {
    progress: &'a Progress,
    last_bytes: u64,
    last_update: std::time::Instant,
}

impl<'a> ProgressPrinter<'a> {
    pub fn new(progress: &'a Progress) -> Self {
        Self {
            progress,
            last_bytes: progress.bytes_copied.get(),
            last_update: std::time::Instant::now(),
        }
    }

    /// Multi-line report used for non-interactive output.
    pub fn print(&mut self) -> String {
        let (average_rate, current_rate) = self.rates();
        format!(
            "---------------------\n\
            ENTRIES:\n\
            done:    {:>10}\n\
            total:   {:>10}\n\
            failed:  {:>10}\n\
            -----------------------\n\
            COPIED:\n\
            average: {:>10}/s\n\
            current: {:>10}/s\n\
            total:   {:>10}\n\
            \n\
            files:       {:>10}\n\
            directories: {:>10}\n\
            unchanged:   {:>10}",
            self.progress.entries_done.get(),
            self.progress.entries_total.get(),
            self.progress.failures.get(),
            bytesize::ByteSize(average_rate),
            bytesize::ByteSize(current_rate),
            bytesize::ByteSize(self.progress.bytes_copied.get()),
            self.progress.files_copied.get(),
            self.progress.directories_created.get(),
            self.progress.directories_unchanged.get(),
        )
    }

    /// Single-line report used as the progress bar message.
    pub fn print_line(&mut self) -> String {
        let (_, current_rate) = self.rates();
        format!(
            "entries: {}/{} | copied: {} ({}/s) | failed: {}",
            self.progress.entries_done.get(),
            self.progress.entries_total.get(),
            bytesize::ByteSize(self.progress.bytes_copied.get()),
            bytesize::ByteSize(current_rate),
            self.progress.failures.get(),
        )
    }

    fn rates(&mut self) -> (u64, u64) {
        let time_now = std::time::Instant::now();
        let total_duration_secs = self.progress.get_duration().as_secs_f64();
        let curr_duration_secs = (time_now - self.last_update).as_secs_f64();
        let bytes = self.progress.bytes_copied.get();
        let average = if total_duration_secs > 0.0 {
            bytes as f64 / total_duration_secs
        } else {
            0.0
        };
        let current = if curr_duration_secs > 0.0 {
            (bytes - self.last_bytes) as f64 / curr_duration_secs
        } else {
            0.0
        };
        self.last_bytes = bytes;
        self.last_update = time_now;
        (average as u64, current as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_counting() {
        let counter = Counter::default();
        for _ in 0..10 {
            counter.inc();
        }
        counter.add(5);
        assert_eq!(counter.get(), 15);
    }

    #[test]
    fn threaded_counting() {
        let counter = Counter::default();
        std::thread::scope(|scope| {
            for _ in 0..10 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        counter.inc();
                    }
                });
            }
        });
        assert_eq!(counter.get(), 1000);
    }

    #[test]
    fn printer_reports_counters() {
        let progress = Progress::new();
        progress.entries_total.add(3);
        progress.entries_done.add(2);
        progress.files_copied.inc();
        progress.failures.inc();
        let mut printer = ProgressPrinter::new(&progress);
        let line = printer.print_line();
        assert!(line.contains("entries: 2/3"));
        assert!(line.contains("failed: 1"));
        let report = printer.print();
        assert!(report.contains("files:"));
    }
}

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use flate2::bufread::GzDecoder;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::error::ParseError;

/// Activity labels of one trace, in order
pub type ActivityTrace = Vec<String>;

const ACTIVITY_KEY: &[u8] = b"concept:name";

///
/// Import activity traces from a CSV reader
///
/// One trace per line, one label per field. Lines with an empty first field are skipped.
///
pub fn import_csv<R: Read>(reader: R) -> Result<Vec<ActivityTrace>, ParseError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut traces = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if record.get(0).map_or(true, str::is_empty) {
            continue;
        }
        traces.push(record.iter().map(String::from).collect());
    }
    Ok(traces)
}

struct XesState {
    depth: usize,
    found_log: bool,
    trace: Option<ActivityTrace>,
    /// Depth of the currently open `<event>` and its label (if seen yet)
    event: Option<(usize, Option<String>)>,
}

impl XesState {
    fn open(&mut self, t: &BytesStart<'_>, depth: usize) -> Result<(), ParseError> {
        match t.local_name().as_ref() {
            b"log" if depth == 1 => self.found_log = true,
            b"trace" if self.found_log && depth == 2 => self.trace = Some(Vec::new()),
            b"event" if self.trace.is_some() && depth == 3 => self.event = Some((depth, None)),
            b"string" => {
                if let Some((event_depth, label @ None)) = &mut self.event {
                    if depth == *event_depth + 1 {
                        let mut key = None;
                        let mut value = None;
                        for attr in t.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"key" => key = Some(attr.value.into_owned()),
                                b"value" => value = Some(attr.unescape_value()?.into_owned()),
                                _ => {}
                            }
                        }
                        if key.as_deref() == Some(ACTIVITY_KEY) {
                            *label = Some(value.ok_or(ParseError::MissingKey {
                                element: "string",
                                key: "value",
                            })?);
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, depth: usize, traces: &mut Vec<ActivityTrace>) {
        if matches!(self.event, Some((event_depth, _)) if event_depth == depth) {
            if let Some((_, label)) = self.event.take() {
                match (label, self.trace.as_mut()) {
                    (Some(label), Some(trace)) => trace.push(label),
                    _ => tracing::warn!("Skipping XES event without concept:name"),
                }
            }
        } else if depth == 2 {
            if let Some(trace) = self.trace.take() {
                traces.push(trace);
            }
        }
    }
}

///
/// Import activity traces from a XES reader
///
/// Streams the document; each event contributes the value of its direct `<string key="concept:name">` child.
/// Events without such a child are skipped.
///
pub fn import_xes<R: BufRead>(reader: R) -> Result<Vec<ActivityTrace>, ParseError> {
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut traces = Vec::new();
    let mut state = XesState {
        depth: 0,
        found_log: false,
        trace: None,
        event: None,
    };
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(t) => {
                state.depth += 1;
                let depth = state.depth;
                state.open(&t, depth)?;
            }
            Event::Empty(t) => {
                let depth = state.depth + 1;
                state.open(&t, depth)?;
                state.close(depth, &mut traces);
            }
            Event::End(_) => {
                let depth = state.depth;
                state.close(depth, &mut traces);
                state.depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if !state.found_log {
        return Err(ParseError::NoTopLevelLog);
    }
    Ok(traces)
}

///
/// Import activity traces from a XES byte slice (&\[u8\])
///
/// * `is_compressed_gz`: Parse the passed `xes_data` as a compressed .gz archive
///
pub fn import_xes_slice(
    xes_data: &[u8],
    is_compressed_gz: bool,
) -> Result<Vec<ActivityTrace>, ParseError> {
    if is_compressed_gz {
        let gz: GzDecoder<&[u8]> = GzDecoder::new(xes_data);
        return import_xes(BufReader::new(gz));
    }
    import_xes(BufReader::new(xes_data))
}

///
/// Import activity traces from a log file
///
/// The format is chosen by extension: `.csv`, `.xes` or `.xes.gz`.
///
pub fn import_log_file<P: AsRef<Path>>(path: P) -> crate::Result<Vec<ActivityTrace>> {
    let path = path.as_ref();
    let name = path.to_string_lossy().to_lowercase();
    let traces = if name.ends_with(".csv") {
        import_csv(File::open(path)?)?
    } else if name.ends_with(".xes.gz") {
        let file = File::open(path)?;
        import_xes(BufReader::new(GzDecoder::new(BufReader::new(file))))?
    } else if name.ends_with(".xes") {
        import_xes(BufReader::new(File::open(path)?))?
    } else {
        return Err(ParseError::UnsupportedLogFormat(path.display().to_string()).into());
    };
    tracing::info!("Read {} traces from {}", traces.len(), path.display());
    Ok(traces)
}

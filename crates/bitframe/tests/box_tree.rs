//! A box/atom container format (32-bit size, four-character type, 64-bit
//! size when the short one is 1) parsed end to end.

use std::io::Write;

use bitframe::{
    Error, Result,
    cached::Cached,
    composer::Composer,
    field::{Array, Text, be},
    file_stream::FileStream,
    parser::{Event, EventKind, Header, LogObserver, Observer, Parse, Parser, suppress_end_of_stream},
    remainder::Remainder,
    stream::{MemoryStream, Stream},
};

const CONTAINERS: [&str; 3] = ["moov", "trak", "mdia"];

struct BoxHeader {
    kind: String,
    size: u64,
    header_size: u64,
}

impl Header for BoxHeader {
    fn name(&self) -> &str {
        &self.kind
    }
}

fn read_header<S: Stream, O: Observer>(
    parser: &mut Parser<S, O>,
    remainder: &mut Remainder,
) -> Result<BoxHeader> {
    let (size, kind) = parser.get((be::U32, Text::string(4)))?;
    let short = Cached::new(size, &*parser).value().as_u64();
    let kind = kind.text(&*parser);

    let (size, header_size) = if short == 1 {
        let large = parser.get(be::U64)?;
        (large.get(&*parser).as_u64(), 16)
    } else {
        (short, 8)
    };
    if size < header_size {
        return Err(Error::Decode(format!("{kind}: size {size} is smaller than its header")));
    }

    remainder.reduce(size)?;
    Ok(BoxHeader {
        kind,
        size,
        header_size,
    })
}

struct BoxTree;

impl<S: Stream, O: Observer> Parse<S, O> for BoxTree {
    fn parse(
        &mut self,
        parser: &mut Parser<S, O>,
        remainder: &mut Remainder,
        raise_eos: bool,
    ) -> Result<()> {
        while !remainder.is_exhausted() {
            let Some(header) = suppress_end_of_stream(read_header(parser, remainder), raise_eos)?
            else {
                break;
            };
            parser.header(&header);
            parser.commit();

            let content = header.size - header.header_size;
            if CONTAINERS.contains(&header.kind.as_str()) {
                parser.scoped(&header, Remainder::new(content), |parser, inner| {
                    BoxTree.parse(parser, inner, true)
                })?;
            } else {
                parser.payload(&header, &mut Remainder::new(content), content)?;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Recorder {
    lines: Vec<String>,
}

impl Observer for Recorder {
    fn event(&mut self, event: &Event<'_>) {
        let header = event.cast_header::<BoxHeader>();
        let kind = header.map(|h| h.kind.as_str()).unwrap_or_default();
        let line = match event.kind {
            EventKind::Exception(error) => format!("exception {error}"),
            EventKind::Header(_) => format!("header {kind} {}", header.map_or(0, |h| h.size)),
            EventKind::Begin { remainder, .. } => format!("begin {kind} {}", remainder.left()),
            EventKind::Data { blob, .. } => format!("data {kind} {}+{}", blob.offset, blob.size),
            EventKind::End { remainder, .. } => format!("end {kind} {}", remainder.left()),
        };
        self.lines.push(format!("{}{line}", " ".repeat(event.depth)));
    }
}

fn leaf(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut bytes = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
    bytes.extend_from_slice(kind);
    bytes.extend_from_slice(payload);
    bytes
}

fn large(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut bytes = 1u32.to_be_bytes().to_vec();
    bytes.extend_from_slice(kind);
    bytes.extend_from_slice(&((16 + payload.len()) as u64).to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

fn container(kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    leaf(kind, &children.concat())
}

fn sample_tree() -> Vec<u8> {
    let trak = container(b"trak", &[leaf(b"tkhd", &[0; 4])]);
    let moov = container(b"moov", &[leaf(b"mvhd", &[0; 12]), trak]);
    [leaf(b"ftyp", b"isom\0\0\0\x01"), moov, large(b"mdat", &[0xAB; 10])].concat()
}

fn run<S: Stream>(stream: S) -> (Result<bool>, Vec<String>) {
    let mut parser = Parser::with_observer(stream, Recorder::default());
    let result = parser.run(&mut BoxTree, &mut Remainder::default(), false);
    (result, parser.into_observer().lines)
}

#[test]
fn test_walks_box_tree_from_memory() {
    let (result, lines) = run(MemoryStream::new(sample_tree()));
    assert!(result.unwrap());
    assert_eq!(
        lines,
        [
            "header ftyp 16",
            "data ftyp 8+8",
            "header moov 48",
            "begin moov 40",
            " header mvhd 20",
            " data mvhd 32+12",
            " header trak 20",
            " begin trak 12",
            "  header tkhd 12",
            "  data tkhd 60+4",
            " end trak 0",
            "end moov 0",
            "header mdat 26",
            "data mdat 80+10",
        ]
    );
}

#[test]
fn test_walks_box_tree_from_file() {
    let bytes = [
        leaf(b"ftyp", b"isom\0\0\0\x01"),
        leaf(b"mdat", &vec![0x5A; 5000]),
        leaf(b"free", b"tail"),
    ]
    .concat();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let stream = FileStream::open(file.path(), 1024).unwrap();
    let (result, lines) = run(stream);
    assert!(result.unwrap());
    assert_eq!(
        lines,
        [
            "header ftyp 16",
            "data ftyp 8+8",
            "header mdat 5008",
            "data mdat 24+5000",
            "header free 12",
            "data free 5032+4",
        ]
    );
}

#[test]
fn test_child_overrunning_parent_fails() {
    // moov declares room for the child's header only.
    let mut bytes = leaf(b"moov", &leaf(b"mvhd", &[0; 12])[..8]);
    bytes.extend_from_slice(&[0; 12]);

    let (result, lines) = run(MemoryStream::new(bytes));
    assert!(matches!(
        result,
        Err(Error::Overcommitment {
            requested: 20,
            left: 8
        })
    ));
    assert_eq!(
        lines,
        [
            "header moov 16",
            "begin moov 8",
            "end moov 8",
            "exception overcommitment: 20 bytes requested, 8 left",
        ]
    );
}

#[test]
fn test_truncated_container_stops_quietly() {
    let mut bytes = 24u32.to_be_bytes().to_vec();
    bytes.extend_from_slice(b"moov");
    bytes.extend_from_slice(&[0, 0]);

    let (result, lines) = run(MemoryStream::new(bytes));
    assert!(!result.unwrap());
    assert_eq!(lines, ["header moov 24", "begin moov 16", "end moov 16"]);
}

#[test]
fn test_undersized_box_is_a_decode_error() {
    let mut bytes = 4u32.to_be_bytes().to_vec();
    bytes.extend_from_slice(b"skip");

    let (result, lines) = run(MemoryStream::new(bytes));
    let err = result.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert_eq!(lines, [format!("exception {err}")]);
}

#[test]
fn test_composed_boxes_parse_back() {
    let mut composer = Composer::new(MemoryStream::growable());
    composer.put_field(be::U32, 12u8).unwrap();
    composer.put_text(Text::string(4), "free").unwrap();
    composer.put_array(Array::dynamic(be::U8), b"tail").unwrap();
    composer.put_field(be::U32, 1u8).unwrap();
    composer.put_text(Text::string(4), "skip").unwrap();
    composer.put_field(be::U64, 16u8).unwrap();
    composer.commit();
    let bytes = composer.into_inner().into_inner();
    assert_eq!(bytes.len(), 28);

    let (result, lines) = run(MemoryStream::new(bytes));
    assert!(result.unwrap());
    assert_eq!(
        lines,
        ["header free 12", "data free 8+4", "header skip 16", "data skip 28+0"]
    );
}

#[test]
fn test_log_observer_walks_tree() {
    let mut parser = Parser::with_observer(MemoryStream::new(sample_tree()), LogObserver);
    assert!(parser.run(&mut BoxTree, &mut Remainder::default(), true).is_err());

    let mut parser = Parser::with_observer(MemoryStream::new(sample_tree()), LogObserver);
    assert!(parser.run(&mut BoxTree, &mut Remainder::new(90), true).unwrap());
}

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::{
    errors::{ConvertError, ConvertResult},
    ofx::{charset, prelude::*},
};

fn encoding_name<S: Serializer>(encoding: &&'static Encoding, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(encoding.name())
}

/// Result of converting one statement
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub institution: Institution,
    pub summary: SignOnSummary,
    /// Encoding the statement was read in and is written back in
    #[serde(serialize_with = "encoding_name")]
    pub encoding: &'static Encoding,
    /// Header block followed by the rewritten XML body
    #[serde(skip)]
    pub content: String,
}

impl Conversion {
    /// `content` encoded for writing to disk.
    pub fn encoded(&self) -> Cow<'_, [u8]> {
        charset::encode(&self.content, self.encoding)
    }
}

#[derive(Default)]
pub struct ConverterBuilder {
    content: Option<String>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
}

impl ConverterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts this text instead of reading the input file.
    pub fn content(mut self, content: &str) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.input = Some(path.as_ref().to_path_buf());
        self
    }

    /// Overrides the `<input-stem>.QFX` output path.
    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.output = Some(path.as_ref().to_path_buf());
        self
    }

    fn output_path(&self) -> Option<PathBuf> {
        self.output
            .clone()
            .or_else(|| self.input.as_deref().map(output_path))
    }

    /// Runs the conversion in memory.
    pub fn convert(self) -> ConvertResult<Conversion> {
        let output = self.output_path();
        let institution = Institution::PENTAGON_FEDERAL;

        let OfxSource { parts, encoding } = match (self.content, &self.input) {
            (Some(content), _) => OfxSource {
                encoding: charset::detect(content.as_bytes()),
                parts: split(&content.replace("\r\n", "\n")),
            },
            (None, Some(input)) => read_ofx_file(input)?,
            (None, None) => return Err(ConvertError::MissingInput),
        };

        let mut document = Document::parse(&parts.xml)?;
        debug!(
            root = document.root().name(),
            encoding = document.declared_encoding().unwrap_or(encoding.name()),
            "parsed XML body"
        );
        patch(&mut document, &institution)?;

        let summary = SignOnSummary::from_document(&document);
        if summary.intu_bids > 1 {
            warn!(count = summary.intu_bids, "statement already carried INTU nodes, duplicates were appended");
        }

        Ok(Conversion {
            input: self.input,
            output,
            institution,
            summary,
            encoding,
            content: parts.assemble(&document.to_string()),
        })
    }

    /// Runs the conversion and writes the result to the output path.
    pub fn write(self) -> ConvertResult<Conversion> {
        let output = self.output_path().ok_or(ConvertError::MissingInput)?;
        if let Some(input) = &self.input {
            if same_file(input, &output) {
                return Err(ConvertError::OutputOverwritesInput(output));
            }
        }

        let conversion = self.convert()?;
        let bytes = conversion.encoded();
        fs::write(&output, &bytes).map_err(|e| ConvertError::write(&output, e))?;
        info!(
            output = %output.display(),
            encoding = conversion.encoding.name(),
            bytes = bytes.len(),
            "wrote QFX file"
        );

        Ok(conversion)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FileMode;
    use rstest::rstest;

    const SAMPLE_OFX: &str = "OFXHEADER:100
DATA:OFXSGML
VERSION:102
SECURITY:NONE
ENCODING:USASCII
CHARSET:1252
COMPRESSION:NONE
OLDFILEUID:NONE
NEWFILEUID:NONE

<OFX>
<SIGNONMSGSRSV1>
<SONRS>
<STATUS><CODE>0</CODE><SEVERITY>INFO</SEVERITY></STATUS>
<DTSERVER>20251226120000.000</DTSERVER>
<LANGUAGE>ENG</LANGUAGE>
<FI><ORG>Pfcu</ORG><FID></FID></FI>
</SONRS>
</SIGNONMSGSRSV1>
<BANKMSGSRSV1>
<STMTTRNRS>
<TRNUID>1</TRNUID>
<STMTRS>
<CURDEF>USD</CURDEF>
<BANKTRANLIST>
<STMTTRN><TRNTYPE>DEBIT</TRNTYPE><DTPOSTED>20251226</DTPOSTED><TRNAMT>-50.00</TRNAMT><FITID>1</FITID><NAME>Coffee</NAME></STMTTRN>
</BANKTRANLIST>
</STMTRS>
</STMTTRNRS>
</BANKMSGSRSV1>
</OFX>
";

    fn write_sample(dir: &Path, name: &str, content: &str) -> PathBuf {
        write_bytes(dir, name, content.as_bytes())
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_builder_new() {
        let builder = ConverterBuilder::new();
        assert!(builder.content.is_none());
        assert!(builder.input.is_none());
        assert!(builder.output.is_none());
    }

    #[test]
    fn test_builder_missing_input() {
        let result = ConverterBuilder::new().convert();
        assert!(matches!(result, Err(ConvertError::MissingInput)));
    }

    #[rstest]
    #[case(Some("statement.OFX"), None, Some("statement.QFX"))]
    #[case(Some("statement.OFX"), Some("out/custom.qfx"), Some("out/custom.qfx"))]
    #[case(None, Some("custom.QFX"), Some("custom.QFX"))]
    #[case(None, None, None)]
    fn test_builder_output_path(
        #[case] input: Option<&str>,
        #[case] output: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let mut builder = ConverterBuilder::new();
        if let Some(input) = input {
            builder = builder.input(input);
        }
        if let Some(output) = output {
            builder = builder.output(output);
        }
        assert_eq!(builder.output_path(), expected.map(PathBuf::from));
    }

    #[test]
    fn test_convert_content() {
        let conversion = ConverterBuilder::new().content(SAMPLE_OFX).convert().unwrap();

        assert!(conversion.content.starts_with("OFXHEADER:100\nDATA:OFXSGML\n"));
        assert!(conversion.content.contains("NEWFILEUID:NONE\n\n<OFX>"));
        assert!(conversion
            .content
            .contains("<ORG>PENTAGON FEDERAL CREDIT UNION</ORG><FID>10360</FID>"));
        assert!(conversion
            .content
            .contains("<INTU.BID>10360</INTU.BID><INTU.USERID>10360</INTU.USERID></SONRS>"));
        assert!(conversion.content.contains("<NAME>Coffee</NAME>"));
        assert_eq!(conversion.summary.fid.as_deref(), Some("10360"));
        assert_eq!(conversion.summary.intu_bids, 1);
        assert_eq!(conversion.encoding.name(), "windows-1252");
        assert_eq!(conversion.output, None);
    }

    #[rstest]
    #[case::root_attributes(
        "<OFX xmlns=\"http://ofx.net\">\n<SIGNONMSGSRSV1><SONRS><FI><ORG>Pfcu</ORG><FID></FID></FI></SONRS></SIGNONMSGSRSV1>\n</OFX>\n"
    )]
    #[case::repeated_fi(
        "<OFX>\n<SIGNONMSGSRSV1><SONRS><FI><ORG>Pfcu</ORG><FID></FID></FI><FI><ORG>Pfcu</ORG></FI></SONRS></SIGNONMSGSRSV1>\n</OFX>\n"
    )]
    #[case::leading_bom(
        "\u{feff}<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<OFX>\n<SIGNONMSGSRSV1><SONRS><FI><ORG>Pfcu</ORG><FID/></FI></SONRS></SIGNONMSGSRSV1>\n</OFX>\n"
    )]
    fn test_convert_xml_only_bodies(#[case] content: &str) {
        let conversion = ConverterBuilder::new().content(content).convert().unwrap();

        assert!(conversion
            .content
            .contains("<ORG>PENTAGON FEDERAL CREDIT UNION</ORG><FID>10360</FID></FI>"));
        assert_eq!(conversion.summary.org.as_deref(), Some("PENTAGON FEDERAL CREDIT UNION"));
        assert_eq!(conversion.content.starts_with('\u{feff}'), content.starts_with('\u{feff}'));
    }

    #[test]
    fn test_write_keeps_windows_1252_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("statement.OFX");
        let mut bytes = SAMPLE_OFX.as_bytes().to_vec();
        let name_at = SAMPLE_OFX.find("Coffee").unwrap();
        bytes.splice(name_at..name_at + "Coffee".len(), b"Caf\xe9".iter().copied());
        fs::write(&input, &bytes).unwrap();

        let conversion = ConverterBuilder::new().input(&input).write().unwrap();

        let written = fs::read(dir.path().join("statement.QFX")).unwrap();
        assert_eq!(conversion.encoding.name(), "windows-1252");
        assert!(contains(&written, b"<NAME>Caf\xe9<"));
        assert!(written.starts_with(b"OFXHEADER:100\nDATA:OFXSGML\n"));
        assert!(String::from_utf8(written).is_err());
    }

    #[test]
    fn test_write_keeps_declared_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_bytes(
            dir.path(),
            "statement.ofx",
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<OFX>\n<SIGNONMSGSRSV1><SONRS><FI><ORG>Cr\xe8me</ORG><FID/></FI></SONRS></SIGNONMSGSRSV1>\n<MEMO>d\xe9p\xf4t</MEMO>\n</OFX>\n",
        );

        ConverterBuilder::new().input(&input).write().unwrap();

        let written = fs::read(dir.path().join("statement.QFX")).unwrap();
        assert!(written.starts_with(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n"));
        assert!(contains(&written, b"<MEMO>d\xe9p\xf4t"));
        assert!(contains(&written, b"PENTAGON FEDERAL CREDIT UNION<"));
    }

    #[test]
    fn test_write_keeps_utf8_bom() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_bytes(
            dir.path(),
            "statement.OFX",
            b"\xef\xbb\xbf<?xml version=\"1.0\"?>\n<OFX>\n<SIGNONMSGSRSV1><SONRS><FI><ORG>Pfcu</ORG><FID/></FI></SONRS></SIGNONMSGSRSV1>\n</OFX>\n",
        );

        ConverterBuilder::new().input(&input).write().unwrap();

        let written = fs::read(dir.path().join("statement.QFX")).unwrap();
        assert!(written.starts_with(b"\xef\xbb\xbf<?xml version=\"1.0\"?>\n<OFX>"));
    }

    #[test]
    fn test_convert_crlf_content() {
        let crlf = SAMPLE_OFX.replace('\n', "\r\n");
        let conversion = ConverterBuilder::new().content(&crlf).convert().unwrap();
        assert!(!conversion.content.contains('\r'));
    }

    #[test]
    fn test_write_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), "statement.OFX", SAMPLE_OFX);

        let conversion = ConverterBuilder::new().input(&input).write().unwrap();

        let expected = dir.path().join("statement.QFX");
        assert_eq!(conversion.output.as_deref(), Some(expected.as_path()));
        let written = fs::read_to_string(&expected).unwrap();
        assert_eq!(written, conversion.content);
        assert!(written.contains("<INTU.USERID>10360</INTU.USERID>"));
    }

    #[test]
    fn test_write_missing_signon_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(
            dir.path(),
            "statement.OFX",
            "OFXHEADER:100\n\n<OFX>\n<BANKMSGSRSV1></BANKMSGSRSV1>\n</OFX>\n",
        );

        let result = ConverterBuilder::new().input(&input).write();

        assert!(matches!(result, Err(ConvertError::NodeNotFound(ref name)) if name == "SIGNONMSGSRSV1"));
        assert!(!dir.path().join("statement.QFX").exists());
    }

    #[test]
    fn test_write_malformed_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(
            dir.path(),
            "statement.OFX",
            "OFXHEADER:100\n\n<OFX>\n<SIGNONMSGSRSV1>\n</OFX>\n",
        );

        let result = ConverterBuilder::new().input(&input).write();

        assert!(matches!(result, Err(ConvertError::Parse { line: 3, .. })));
        assert!(!dir.path().join("statement.QFX").exists());
    }

    #[test]
    fn test_write_refuses_to_overwrite_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), "statement.QFX", SAMPLE_OFX);

        let result = ConverterBuilder::new().input(&input).write();

        assert!(matches!(result, Err(ConvertError::OutputOverwritesInput(_))));
        assert_eq!(fs::read_to_string(&input).unwrap(), SAMPLE_OFX);
    }

    #[test]
    fn test_write_unwritable_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), "statement.OFX", SAMPLE_OFX);

        let result = ConverterBuilder::new()
            .input(&input)
            .output(dir.path().join("missing-dir").join("out.QFX"))
            .write();

        assert!(matches!(
            result,
            Err(ConvertError::FileOpen { mode: FileMode::Write, .. })
        ));
    }

    #[test]
    fn test_read_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConverterBuilder::new()
            .input(dir.path().join("absent.OFX"))
            .write();

        assert!(matches!(
            result,
            Err(ConvertError::FileOpen { mode: FileMode::Read, .. })
        ));
    }

    #[test]
    fn test_conversion_report_json() {
        let conversion = ConverterBuilder::new()
            .content(SAMPLE_OFX)
            .output("statement.QFX")
            .convert()
            .unwrap();

        let json = serde_json::to_string(&conversion).unwrap();
        assert!(json.contains("\"output\":\"statement.QFX\""));
        assert!(json.contains("PENTAGON FEDERAL CREDIT UNION"));
        assert!(json.contains("\"encoding\":\"windows-1252\""));
        assert!(!json.contains("OFXHEADER"));
    }
}

//! Names the finding rules recognize, per finding and language.
//!
//! Names are matched against the dotted expression text the syntax builder
//! records on invocations, member accesses and assignment targets, e.g.
//! `req.query`, `cursor.execute` or `element.innerHTML`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::FindingId;
use crate::eval::{MatchMode, NameMatcher, NamePattern};
use crate::ir::Language;

/// Matchers for one `(finding, language)` pair.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Expressions producing attacker-controlled data.
    pub sources: NameMatcher,
    /// Calls (or assignment targets) that must not receive tainted data.
    pub sinks: NameMatcher,
    /// Calls whose result is safe whatever their input.
    pub sanitizers: NameMatcher,
    /// Expressions that are findings by themselves.
    pub triggers: NameMatcher,
    /// String constants that make a sink call insecure.
    pub insecure_literals: NameMatcher,
    /// Elliptic curves too small to be safe, by curve name.
    pub weak_curves: NameMatcher,
    /// Broken TLS/SSL protocol versions, as string constants or library
    /// constants.
    pub weak_protocols: NameMatcher,
}

static EMPTY: Lazy<RuleSet> = Lazy::new(RuleSet::default);

/// User additions to the built-in catalog, from `[[analysis.rules]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogExtension {
    pub finding: FindingId,
    pub language: Language,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub sinks: Vec<String>,
    #[serde(default)]
    pub sanitizers: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub insecure_literals: Vec<String>,
    #[serde(default)]
    pub weak_curves: Vec<String>,
    #[serde(default)]
    pub weak_protocols: Vec<String>,
}

impl CatalogExtension {
    /// Every pattern this extension adds, in field order.
    pub fn patterns(&self) -> impl Iterator<Item = &String> {
        self.sources
            .iter()
            .chain(&self.sinks)
            .chain(&self.sanitizers)
            .chain(&self.triggers)
            .chain(&self.insecure_literals)
            .chain(&self.weak_curves)
            .chain(&self.weak_protocols)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sets: HashMap<(FindingId, Language), RuleSet>,
}

/// TypeScript shares the JavaScript tables.
fn table_language(language: Language) -> Language {
    if language.is_ecmascript() {
        Language::JavaScript
    } else {
        language
    }
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        let js = Language::JavaScript;
        let py = Language::Python;

        for finding in [FindingId::F001, FindingId::F004, FindingId::F008, FindingId::F063] {
            catalog.set(finding, js).sources = javascript_sources();
            catalog.set(finding, py).sources = python_sources();
        }

        // SQL injection
        catalog.set(FindingId::F001, js).sinks = NameMatcher::exact(&["query", "execute"])
            .with(NamePattern::new(".query", MatchMode::Suffix))
            .with(NamePattern::new(".execute", MatchMode::Suffix))
            .with(NamePattern::new(".raw", MatchMode::Suffix))
            .with(NamePattern::new(".unsafe", MatchMode::Suffix));
        catalog.set(FindingId::F001, js).sanitizers =
            NameMatcher::exact(&["parseInt", "parseFloat", "Number", "escape", "SqlString.escape"])
                .with(NamePattern::new(".escape", MatchMode::Suffix))
                .with(NamePattern::new(".escapeId", MatchMode::Suffix));
        catalog.set(FindingId::F001, py).sinks =
            NameMatcher::exact(&["text", "sqlalchemy.text"])
                .with(NamePattern::new(".execute", MatchMode::Suffix))
                .with(NamePattern::new(".executemany", MatchMode::Suffix))
                .with(NamePattern::new(".executescript", MatchMode::Suffix))
                .with(NamePattern::new(".raw", MatchMode::Suffix))
                .with(NamePattern::new(".extra", MatchMode::Suffix));
        catalog.set(FindingId::F001, py).sanitizers = NameMatcher::exact(&["int", "float", "bool"])
            .with(NamePattern::new("escape_string", MatchMode::Suffix));

        // OS command injection
        catalog.set(FindingId::F004, js).sinks = NameMatcher::exact(&[
            "exec",
            "execSync",
            "spawn",
            "spawnSync",
            "child_process.exec",
            "child_process.execSync",
            "child_process.spawn",
            "child_process.spawnSync",
            "cp.exec",
            "cp.execSync",
            "shell.exec",
            "shelljs.exec",
        ]);
        catalog.set(FindingId::F004, js).sanitizers =
            NameMatcher::exact(&["shellescape", "shellEscape", "shellQuote.quote", "parseInt", "Number"]);
        catalog.set(FindingId::F004, py).sinks = NameMatcher::exact(&[
            "os.system",
            "os.popen",
            "os.execl",
            "os.execlp",
            "os.spawnl",
            "subprocess.call",
            "subprocess.run",
            "subprocess.Popen",
            "subprocess.check_call",
            "subprocess.check_output",
            "subprocess.getoutput",
            "subprocess.getstatusoutput",
            "commands.getoutput",
        ]);
        catalog.set(FindingId::F004, py).sanitizers =
            NameMatcher::exact(&["shlex.quote", "pipes.quote", "quote", "int"]);

        // Reflected XSS
        catalog.set(FindingId::F008, js).sinks = NameMatcher::exact(&[
            "res.send",
            "res.write",
            "res.end",
            "response.send",
            "response.write",
            "response.end",
            "document.write",
            "document.writeln",
            "ctx.body",
        ])
        .with(NamePattern::new(").send", MatchMode::Suffix))
        .with(NamePattern::new(".innerHTML", MatchMode::Suffix))
        .with(NamePattern::new(".outerHTML", MatchMode::Suffix))
        .with(NamePattern::new(".insertAdjacentHTML", MatchMode::Suffix));
        catalog.set(FindingId::F008, js).sanitizers = NameMatcher::exact(&[
            "escape",
            "escapeHtml",
            "encodeURIComponent",
            "encodeURI",
            "he.encode",
            "he.escape",
            "validator.escape",
            "xss",
            "filterXSS",
            "DOMPurify.sanitize",
            "sanitizeHtml",
            "_.escape",
            "parseInt",
            "Number",
        ]);
        catalog.set(FindingId::F008, py).sinks = NameMatcher::exact(&[
            "make_response",
            "flask.make_response",
            "Response",
            "HttpResponse",
            "django.http.HttpResponse",
            "Markup",
            "markupsafe.Markup",
            "mark_safe",
            "render_template_string",
            "self.write",
        ]);
        catalog.set(FindingId::F008, py).sanitizers = NameMatcher::exact(&[
            "escape",
            "html.escape",
            "markupsafe.escape",
            "flask.escape",
            "cgi.escape",
            "bleach.clean",
            "int",
        ]);

        // Path traversal
        catalog.set(FindingId::F063, js).sinks = NameMatcher::exact(&[
            "res.sendFile",
            "res.download",
            "readFile",
            "readFileSync",
            "createReadStream",
        ])
        .with(NamePattern::new("fs.", MatchMode::Prefix))
        .with(NamePattern::new("fsPromises.", MatchMode::Prefix));
        catalog.set(FindingId::F063, js).sanitizers =
            NameMatcher::exact(&["path.basename", "basename", "sanitizeFilename", "sanitize", "parseInt"]);
        catalog.set(FindingId::F063, py).sinks = NameMatcher::exact(&[
            "open",
            "io.open",
            "os.open",
            "os.remove",
            "os.unlink",
            "os.rmdir",
            "os.listdir",
            "shutil.rmtree",
            "shutil.copy",
            "shutil.copyfile",
            "shutil.move",
            "send_file",
            "flask.send_file",
            "FileResponse",
        ]);
        catalog.set(FindingId::F063, py).sanitizers = NameMatcher::exact(&[
            "os.path.basename",
            "secure_filename",
            "werkzeug.utils.secure_filename",
            "int",
        ]);

        // Insecure randomness
        catalog.set(FindingId::F034, js).triggers = NameMatcher::exact(&["Math.random"]);
        catalog.set(FindingId::F034, py).triggers = NameMatcher::exact(&[
            "random.random",
            "random.randint",
            "random.randrange",
            "random.choice",
            "random.choices",
            "random.uniform",
            "random.getrandbits",
            "random.sample",
            "random.shuffle",
        ]);

        // Insecure cryptography
        let weak_algorithms = insecure_algorithms();
        catalog.set(FindingId::F052, js).insecure_literals = weak_algorithms.clone();
        catalog.set(FindingId::F052, py).insecure_literals = weak_algorithms;
        for language in [js, py] {
            let set = catalog.set(FindingId::F052, language);
            set.weak_curves = weak_curves();
            set.weak_protocols = weak_protocols();
        }
        catalog.set(FindingId::F052, js).sinks = NameMatcher::exact(&[
            "crypto.createHash",
            "crypto.createHmac",
            "crypto.createCipheriv",
            "crypto.createDecipheriv",
            "crypto.generateKeyPair",
            "crypto.generateKeyPairSync",
            "crypto.createECDH",
            "createECDH",
            "createHash",
            "createHmac",
            "createCipheriv",
            "createDecipheriv",
            "generateKeyPairSync",
        ]);
        catalog.set(FindingId::F052, js).triggers = NameMatcher::exact(&[
            "crypto.createCipher",
            "crypto.createDecipher",
            "CryptoJS.MD5",
            "CryptoJS.SHA1",
            "CryptoJS.DES",
            "CryptoJS.TripleDES",
            "CryptoJS.RC4",
            "CryptoJS.mode.ECB",
            "md5",
            "sha1",
        ]);
        catalog.set(FindingId::F052, py).sinks = NameMatcher::exact(&[
            "hashlib.new",
            "hmac.new",
            "rsa.generate_private_key",
            "dsa.generate_private_key",
            "RSA.generate",
            "DSA.generate",
            "Crypto.PublicKey.RSA.generate",
        ]);
        catalog.set(FindingId::F052, py).triggers = NameMatcher::exact(&[
            "hashlib.md5",
            "hashlib.sha1",
            "MD5.new",
            "SHA.new",
            "SHA1.new",
            "DES.new",
            "DES3.new",
            "ARC2.new",
            "ARC4.new",
            "Blowfish.new",
            "AES.MODE_ECB",
            "algorithms.ARC4",
            "algorithms.TripleDES",
            "algorithms.Blowfish",
            "hashes.MD5",
            "hashes.SHA1",
            "modes.ECB",
        ]);

        catalog
    }

    /// Entries for `finding` in `language`; empty when nothing is registered.
    pub fn rules(&self, finding: FindingId, language: Language) -> &RuleSet {
        self.sets
            .get(&(finding, table_language(language)))
            .unwrap_or(&EMPTY)
    }

    fn set(&mut self, finding: FindingId, language: Language) -> &mut RuleSet {
        self.sets
            .entry((finding, table_language(language)))
            .or_default()
    }

    pub fn extend(&mut self, extension: &CatalogExtension) {
        let set = self.set(extension.finding, extension.language);
        set.sources.extend_parsed(&extension.sources);
        set.sinks.extend_parsed(&extension.sinks);
        set.sanitizers.extend_parsed(&extension.sanitizers);
        set.triggers.extend_parsed(&extension.triggers);
        set.insecure_literals.extend_parsed(&extension.insecure_literals);
        set.weak_curves.extend_parsed(&extension.weak_curves);
        set.weak_protocols.extend_parsed(&extension.weak_protocols);
    }
}

fn javascript_sources() -> NameMatcher {
    NameMatcher::exact(&[
        "req.query",
        "req.body",
        "req.params",
        "req.headers",
        "req.cookies",
        "req.url",
        "req.originalUrl",
        "req.path",
        "req.get",
        "req.header",
        "req.param",
        "request.query",
        "request.body",
        "request.params",
        "request.headers",
        "request.cookies",
        "ctx.query",
        "ctx.params",
        "ctx.request.body",
        "ctx.request.query",
        "event.body",
        "event.queryStringParameters",
        "event.pathParameters",
        "process.argv",
        "location.search",
        "location.hash",
        "window.location.search",
        "window.location.hash",
        "document.URL",
        "document.location",
    ])
}

fn python_sources() -> NameMatcher {
    NameMatcher::exact(&[
        "request.args",
        "request.form",
        "request.values",
        "request.json",
        "request.data",
        "request.cookies",
        "request.headers",
        "request.files",
        "request.get_json",
        "request.GET",
        "request.POST",
        "request.body",
        "request.query_params",
        "request.path_params",
        "input",
        "raw_input",
        "sys.argv",
    ])
}

fn insecure_algorithms() -> NameMatcher {
    let mut matcher = NameMatcher::new();
    for name in [
        "md2", "md4", "md5", "sha1", "sha-1", "ripemd", "ripemd160", "des", "des-cbc", "des-ede",
        "des-ede-cbc", "des-ede3", "des-ede3-cbc", "rc2", "rc4", "bf", "bf-cbc", "blowfish",
    ] {
        matcher.push(NamePattern::exact(name).ignore_case());
    }
    matcher.push(NamePattern::new("-ecb", MatchMode::Suffix).ignore_case());
    matcher
}

/// Curves under 224 bits, named as OpenSSL lists them. `secp192r1` is
/// also known as `prime192v1`.
fn weak_curves() -> NameMatcher {
    let mut matcher = NameMatcher::new();
    for name in [
        "secp112r1", "secp112r2", "secp128r1", "secp128r2", "secp160k1", "secp160r1",
        "secp160r2", "secp192k1", "secp192r1", "prime192v1", "prime192v2", "prime192v3",
        "sect113r1", "sect113r2", "sect131r1", "sect131r2", "sect163k1", "sect163r1",
        "sect163r2", "sect193r1", "sect193r2", "c2pnb163v1", "c2pnb163v2", "c2pnb163v3",
        "c2pnb176v1", "c2tnb191v1", "c2tnb191v2", "c2tnb191v3", "c2pnb208w1",
        "wap-wsg-idm-ecid-wtls1", "wap-wsg-idm-ecid-wtls3", "wap-wsg-idm-ecid-wtls4",
        "wap-wsg-idm-ecid-wtls5", "wap-wsg-idm-ecid-wtls6", "wap-wsg-idm-ecid-wtls7",
        "wap-wsg-idm-ecid-wtls8", "wap-wsg-idm-ecid-wtls9", "wap-wsg-idm-ecid-wtls10",
        "wap-wsg-idm-ecid-wtls11", "oakley-ec2n-3", "oakley-ec2n-4", "brainpoolp160r1",
        "brainpoolp160t1", "brainpoolp192r1", "brainpoolp192t1",
    ] {
        matcher.push(NamePattern::exact(name).ignore_case());
    }
    matcher
}

fn weak_protocols() -> NameMatcher {
    let mut matcher = NameMatcher::new();
    for name in [
        "SSLv2", "SSLv3", "TLSv1", "TLSv1.0", "TLSv1.1", "SSLv2_method", "SSLv3_method",
        "TLSv1_method", "TLSv1_1_method", "SSLv3_client_method", "SSLv3_server_method",
        "TLSv1_client_method", "TLSv1_server_method",
    ] {
        matcher.push(NamePattern::exact(name).ignore_case());
    }
    for name in [
        "ssl.PROTOCOL_SSLv2",
        "ssl.PROTOCOL_SSLv3",
        "ssl.PROTOCOL_TLSv1",
        "ssl.PROTOCOL_TLSv1_1",
        "ssl.TLSVersion.SSLv3",
        "ssl.TLSVersion.TLSv1",
        "ssl.TLSVersion.TLSv1_1",
        "SSL.SSLv2_METHOD",
        "SSL.SSLv3_METHOD",
        "SSL.TLSv1_METHOD",
        "SSL.TLSv1_1_METHOD",
    ] {
        matcher.push(NamePattern::exact(name));
    }
    matcher
}

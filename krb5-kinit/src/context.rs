mod profile;

pub use self::profile::Profile;
use nix::unistd::{Uid, User};
use std::{env, time::Duration};

const KRB5_ENV_CLIENT_KTNAME: &str = "KRB5_CLIENT_KTNAME";
const DEFCKTNAME: &str = "FILE:/var/kerberos/krb5/user/%{euid}/client.keytab";

pub struct Conf;

macro_rules! conf {
    ($name:ident, $value:expr) => {
        pub const $name: &'static str = $value;
    };
}

impl Conf {
    conf!(APPDEFAULTS, "appdefaults");
    conf!(DEFAULT_CLIENT_KEYTAB_NAME, "default_client_keytab_name");
    conf!(KINIT_PROGRAM, "kinit_program");
    conf!(KINIT_TIMEOUT, "kinit_timeout");
    conf!(LIBDEFAULTS, "libdefaults");
}

/// Defaults for the `keytab-kinit` front end, read from the krb5 profile.
#[derive(Debug)]
pub struct Context {
    pub profile: Profile,
}

impl Context {
    pub fn init() -> anyhow::Result<Self> {
        Ok(Self::with_profile(Profile::new()?))
    }

    pub fn with_profile(profile: Profile) -> Self {
        Self { profile }
    }

    /// Keytab used when none is named: `KRB5_CLIENT_KTNAME`, then
    /// `libdefaults.default_client_keytab_name`, then the built-in default.
    pub fn default_client_keytab_name(&self) -> anyhow::Result<String> {
        if let Ok(name) = env::var(KRB5_ENV_CLIENT_KTNAME) {
            return Self::expand_path_tokens(&name);
        }
        let key = format!("{}.{}", Conf::LIBDEFAULTS, Conf::DEFAULT_CLIENT_KEYTAB_NAME);
        Self::expand_path_tokens(
            self.profile
                .get_string(&key)
                .as_deref()
                .unwrap_or(DEFCKTNAME),
        )
    }

    pub fn kinit_program(&self) -> Option<String> {
        let key = format!("{}.{}", Conf::APPDEFAULTS, Conf::KINIT_PROGRAM);
        self.profile.get_string(&key).filter(|p| !p.is_empty())
    }

    /// `appdefaults.kinit_timeout` in seconds; zero or unset means no bound.
    pub fn kinit_timeout(&self) -> anyhow::Result<Option<Duration>> {
        let key = format!("{}.{}", Conf::APPDEFAULTS, Conf::KINIT_TIMEOUT);
        match self.profile.get_int(&key) {
            None | Some(0) => Ok(None),
            Some(secs) if secs < 0 => Err(anyhow::anyhow!(
                "Invalid argument while reading {} = {}",
                key,
                secs
            )),
            Some(secs) => Ok(Some(Duration::from_secs(secs as u64))),
        }
    }

    pub fn expand_path_tokens(path: &str) -> anyhow::Result<String> {
        let mut buf = String::with_capacity(path.len());
        let mut path_remained = path;
        while let Some(token_begin) = path_remained.find("%{") {
            buf.push_str(&path_remained[..token_begin]);
            let token_end = match path_remained[token_begin..].find('}') {
                Some(token_end) => token_begin + token_end,
                None => Err(anyhow::anyhow!("Invalid argument"))?,
            };
            buf.push_str(&Self::expand_token(
                &path_remained[token_begin + 2..token_end],
            )?);
            path_remained = &path_remained[token_end + 1..];
        }
        buf.push_str(path_remained);
        Ok(buf)
    }

    fn expand_token(token: &str) -> anyhow::Result<String> {
        let token_value = match token {
            "euid" => Uid::effective().to_string(),
            "username" => User::from_uid(Uid::effective())?
                .map(|u| u.name)
                .unwrap_or_else(|| Uid::effective().to_string()),
            "uid" | "USERID" => Uid::current().to_string(),
            _ => Err(anyhow::anyhow!("Invalid argument"))?,
        };
        Ok(token_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn context_from(contents: &str) -> (tempfile::NamedTempFile, Context) {
        let mut file = tempfile::Builder::new().suffix(".conf").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let profile = Profile::from_paths(&[file.path().display().to_string()]).unwrap();
        (file, Context::with_profile(profile))
    }

    #[test]
    fn expands_known_tokens() {
        let euid = Uid::effective().to_string();
        assert_eq!(
            Context::expand_path_tokens("/var/kerberos/krb5/user/%{euid}/client.keytab").unwrap(),
            format!("/var/kerberos/krb5/user/{}/client.keytab", euid)
        );
        assert_eq!(
            Context::expand_path_tokens("/tmp/%{uid}-%{USERID}").unwrap(),
            format!("/tmp/{0}-{0}", Uid::current())
        );
        assert_eq!(Context::expand_path_tokens("plain").unwrap(), "plain");
    }

    #[test]
    fn rejects_unknown_or_unterminated_tokens() {
        assert!(Context::expand_path_tokens("/tmp/%{bogus}").is_err());
        assert!(Context::expand_path_tokens("/tmp/%{euid").is_err());
    }

    #[test]
    #[serial]
    fn keytab_from_profile() {
        env::remove_var(KRB5_ENV_CLIENT_KTNAME);
        let (_file, context) = context_from(
            "[libdefaults]\ndefault_client_keytab_name = FILE:/etc/krb5/%{euid}.keytab\n",
        );
        assert_eq!(
            context.default_client_keytab_name().unwrap(),
            format!("FILE:/etc/krb5/{}.keytab", Uid::effective())
        );
    }

    #[test]
    #[serial]
    fn keytab_from_environment_wins() {
        let (_file, context) = context_from(
            "[libdefaults]\ndefault_client_keytab_name = /etc/krb5/profile.keytab\n",
        );
        env::set_var(KRB5_ENV_CLIENT_KTNAME, "/etc/krb5/env.keytab");
        let name = context.default_client_keytab_name();
        env::remove_var(KRB5_ENV_CLIENT_KTNAME);
        assert_eq!(name.unwrap(), "/etc/krb5/env.keytab");
    }

    #[test]
    #[serial]
    fn keytab_builtin_default() {
        env::remove_var(KRB5_ENV_CLIENT_KTNAME);
        let (_file, context) = context_from("[libdefaults]\n");
        assert_eq!(
            context.default_client_keytab_name().unwrap(),
            format!(
                "FILE:/var/kerberos/krb5/user/{}/client.keytab",
                Uid::effective()
            )
        );
    }

    #[test]
    fn kinit_settings() {
        let (_file, context) = context_from(
            "[appdefaults]\nkinit_program = /usr/local/bin/kinit\nkinit_timeout = 30\n",
        );
        assert_eq!(
            context.kinit_program().as_deref(),
            Some("/usr/local/bin/kinit")
        );
        assert_eq!(
            context.kinit_timeout().unwrap(),
            Some(Duration::from_secs(30))
        );

        let (_file, context) = context_from("[appdefaults]\nkinit_timeout = 0\n");
        assert_eq!(context.kinit_program(), None);
        assert_eq!(context.kinit_timeout().unwrap(), None);

        let (_file, context) = context_from("[appdefaults]\nkinit_timeout = -1\n");
        assert!(context.kinit_timeout().is_err());
    }
}

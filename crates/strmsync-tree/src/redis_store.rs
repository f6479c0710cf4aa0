//! Redis-backed [`KvStore`]
//!
//! Uses one blocking connection guarded by a mutex. Tree operations run on
//! blocking threads, never on the async runtime's workers.

use std::sync::Mutex;

use redis::{Client, Connection};

use crate::kv::KvStore;
use crate::TreeError;

/// [`KvStore`] over a Redis server
pub struct RedisStore {
    url: String,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish()
    }
}

impl RedisStore {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379/0`)
    pub fn open(url: &str) -> Result<Self, TreeError> {
        let client = Client::open(url)?;
        let conn = client.get_connection()?;
        tracing::info!(url = %url, "Connected to Redis");
        Ok(Self {
            url: url.to_string(),
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> redis::RedisResult<T>,
    ) -> Result<T, TreeError> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        Ok(f(&mut *conn)?)
    }
}

impl KvStore for RedisStore {
    fn append(&self, set_key: &str, list_key: &str, members: &[String]) -> Result<(), TreeError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        {
            let sadd = pipe.cmd("SADD").arg(set_key);
            for member in members {
                sadd.arg(member);
            }
            sadd.ignore();
        }
        {
            let rpush = pipe.cmd("RPUSH").arg(list_key);
            for member in members {
                rpush.arg(member);
            }
            rpush.ignore();
        }
        self.with_conn(|conn| pipe.query::<()>(conn))
    }

    fn delete(&self, keys: &[&str]) -> Result<(), TreeError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(*key);
        }
        self.with_conn(|conn| cmd.query::<()>(conn))
    }

    fn contains_many(&self, set_key: &str, members: &[String]) -> Result<Vec<bool>, TreeError> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for member in members {
            pipe.cmd("SISMEMBER").arg(set_key).arg(member);
        }
        self.with_conn(|conn| pipe.query(conn))
    }

    fn range(&self, list_key: &str, start: u64, len: u64) -> Result<Vec<String>, TreeError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let stop = start.saturating_add(len - 1);
        self.with_conn(|conn| {
            redis::cmd("LRANGE")
                .arg(list_key)
                .arg(start)
                .arg(stop)
                .query(conn)
        })
    }

    fn index(&self, list_key: &str, index: u64) -> Result<Option<String>, TreeError> {
        self.with_conn(|conn| redis::cmd("LINDEX").arg(list_key).arg(index).query(conn))
    }

    fn list_len(&self, list_key: &str) -> Result<u64, TreeError> {
        self.with_conn(|conn| redis::cmd("LLEN").arg(list_key).query(conn))
    }
}

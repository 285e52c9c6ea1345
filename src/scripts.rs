// ============================================================================
// Lua Scripts - every multi-key step runs as one atomic script
// ============================================================================
//
// Queue lists grow on the left (LPUSH) and are consumed from the right
// (RPOP / RPOPLPUSH). Rollback lists receive ids on their left end, so the
// most recently received id sits leftmost.
//
// ============================================================================

use once_cell::sync::Lazy;
use rebus_store::{RedisClient, Script};

/// Sentinel returned by FLUSH and SWEEP when the liveness lock decides
/// nothing may be applied
pub const LOCK_REFUSED: i64 = -1;

/// Argument list for scripts that take none
pub const NO_ARGS: &[&str] = &[];

/// KEYS: message counter, queue. ARGV: envelope, ttl seconds (0 = none).
/// Returns the new message id.
const ENQUEUE: &str = r"
local id = redis.call('INCR', KEYS[1])
local ttl = tonumber(ARGV[2])
if ttl > 0 then
    redis.call('SET', id, ARGV[1], 'EX', ttl)
else
    redis.call('SET', id, ARGV[1])
end
redis.call('LPUSH', KEYS[2], id)
return id
";

/// KEYS: queue. Returns `{id, envelope | false}` or nil on an empty queue.
const DEQUEUE: &str = r"
local id = redis.call('RPOP', KEYS[1])
if not id then
    return false
end
local body = redis.call('GET', id)
redis.call('DEL', id)
return {id, body}
";

/// KEYS: queue, rollback queue, transaction set. ARGV: transaction id.
/// Returns `{id, envelope | false}` or nil on an empty queue.
const RECEIVE_TRANSACTIONAL: &str = r"
local id = redis.call('RPOPLPUSH', KEYS[1], KEYS[2])
if not id then
    return false
end
redis.call('SADD', KEYS[3], ARGV[1])
local body = redis.call('GET', id)
return {id, body}
";

/// KEYS: liveness lock, message counter. ARGV: phase, then the flattened
/// batch operations. The lock is deleted first; a commit whose lock is
/// already gone applies nothing and returns -1. Otherwise returns the
/// number of operations applied.
const FLUSH: &str = r"
local removed = redis.call('DEL', KEYS[1])
if ARGV[1] == 'commit' and removed == 0 then
    return -1
end
local applied = 0
local i = 2
while i <= #ARGV do
    local op = ARGV[i]
    if op == 'send' then
        local id = redis.call('INCR', KEYS[2])
        local ttl = tonumber(ARGV[i + 3])
        if ttl > 0 then
            redis.call('SET', id, ARGV[i + 2], 'EX', ttl)
        else
            redis.call('SET', id, ARGV[i + 2])
        end
        redis.call('LPUSH', ARGV[i + 1], id)
        i = i + 4
    elseif op == 'del' then
        redis.call('DEL', ARGV[i + 1])
        i = i + 2
    elseif op == 'lrem' then
        redis.call('LREM', ARGV[i + 1], 1, ARGV[i + 2])
        i = i + 3
    elseif op == 'restore' then
        if redis.call('LREM', ARGV[i + 1], 1, ARGV[i + 3]) > 0 then
            redis.call('RPUSH', ARGV[i + 2], ARGV[i + 3])
        end
        i = i + 4
    elseif op == 'srem' then
        redis.call('SREM', ARGV[i + 1], ARGV[i + 2])
        i = i + 3
    else
        return redis.error_reply('unknown batch operation ' .. tostring(op))
    end
    applied = applied + 1
end
return applied
";

/// KEYS: liveness lock, rollback queue, queue, transaction set.
/// ARGV: transaction id. Returns -1 while the lock exists, otherwise the
/// number of ids moved back onto the consumer end of the queue.
const SWEEP: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return -1
end
local moved = 0
while redis.call('LMOVE', KEYS[2], KEYS[3], 'LEFT', 'RIGHT') do
    moved = moved + 1
end
redis.call('SREM', KEYS[4], ARGV[1])
return moved
";

pub static ENQUEUE_SCRIPT: Lazy<Script> = Lazy::new(|| RedisClient::create_script(ENQUEUE));
pub static DEQUEUE_SCRIPT: Lazy<Script> = Lazy::new(|| RedisClient::create_script(DEQUEUE));
pub static RECEIVE_TRANSACTIONAL_SCRIPT: Lazy<Script> =
    Lazy::new(|| RedisClient::create_script(RECEIVE_TRANSACTIONAL));
pub static FLUSH_SCRIPT: Lazy<Script> = Lazy::new(|| RedisClient::create_script(FLUSH));
pub static SWEEP_SCRIPT: Lazy<Script> = Lazy::new(|| RedisClient::create_script(SWEEP));

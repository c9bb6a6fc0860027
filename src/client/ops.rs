//! One-call request helpers.
//!
//! Each helper builds the request, waits for the answer and decodes it.
//! Helpers that start a server-side activity (ping, traceroute, capture,
//! firmware update, notification subscriptions) install the feedback callback
//! before the request goes out; keep driving the connection with
//! [`Connection::run`] or [`Connection::process_events`] to receive events.

use std::net::IpAddr;
use std::time::Duration;

use crate::avp::AvpCursor;
use crate::codes::avp;
use crate::decode::{AccessClassReply, CfgSessionInfo, Node, decode_node_list};
use crate::error::Result;
use crate::notification::{Feature, Feedback};
use crate::transport::Socket;
use crate::value::{Value, ValueType};

use super::{AccessClassRequest, Connection, Request};

impl<S: Socket> Connection<S> {
    async fn send_with_feedback<F>(&mut self, feature: Feature, request: Request, callback: F) -> Result<()>
    where
        F: FnMut(Feedback) + Send + 'static,
    {
        self.register_feedback(feature, callback);
        match self.send(&request).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // rc != 0 already released the slot; this covers local failures
                self.clear_feedback(feature);
                Err(e)
            }
        }
    }

    // Sessions

    /// Open a session; returns the session id, which is also stored on the
    /// connection and sent with every later request.
    pub async fn start_session(
        &mut self,
        flags: u32,
        session_timeout: Option<Duration>,
        request_timeout: Option<Duration>,
    ) -> Result<u32> {
        self.send(&Request::start_session(flags, session_timeout, request_timeout)?)
            .await?;
        Ok(self.session_id())
    }

    /// Change the flags of the current session.
    pub async fn switch_session(
        &mut self,
        flags: u32,
        session_timeout: Option<Duration>,
        request_timeout: Option<Duration>,
    ) -> Result<u32> {
        self.send(&Request::switch_session(flags, session_timeout, request_timeout)?)
            .await?;
        Ok(self.session_id())
    }

    pub async fn end_session(&mut self) -> Result<()> {
        self.send(&Request::end_session()).await.map(drop)
    }

    /// Flags of the current session.
    pub async fn session_info(&mut self) -> Result<u32> {
        let answer = self.send(&Request::session_info()).await?;
        answer.require_body()?.expect(avp::UINT32)?.as_u32()
    }

    pub async fn cfg_session_info(&mut self) -> Result<CfgSessionInfo> {
        let answer = self.send(&Request::cfg_session_info()).await?;
        CfgSessionInfo::decode(answer.require_body()?)
    }

    // Database

    /// Read parameters; values come back in request order.
    pub async fn get(&mut self, params: &[(ValueType, &str)]) -> Result<Vec<Value>> {
        let answer = self.send(&Request::get(params)?).await?;
        let mut body = answer.body();
        let mut values = Vec::with_capacity(params.len());
        while let Some(attr) = body.next_avp()? {
            values.push(Value::decode(&attr)?);
        }
        Ok(values)
    }

    pub async fn set(&mut self, params: &[(&str, Value)]) -> Result<()> {
        self.send(&Request::set(params)?).await.map(drop)
    }

    pub async fn list(&mut self, path: &str, level: u16) -> Result<Vec<Node>> {
        let answer = self.send(&Request::list(path, level)?).await?;
        decode_node_list(answer.body())
    }

    /// Create an instance; returns the instance id the server assigned.
    pub async fn add_instance(&mut self, path: &str, id: u16) -> Result<u16> {
        let answer = self.send(&Request::add_instance(path, id)?).await?;
        answer.require_body()?.expect(avp::UINT16)?.as_u16()
    }

    pub async fn del_instance(&mut self, path: &str) -> Result<()> {
        self.send(&Request::del_instance(path)?).await.map(drop)
    }

    pub async fn find_instance(&mut self, path: &str, param: &str, value: &Value) -> Result<u16> {
        let answer = self.send(&Request::find_instance(path, param, value)?).await?;
        answer.require_body()?.expect(avp::UINT16)?.as_u16()
    }

    pub async fn commit(&mut self) -> Result<()> {
        self.send(&Request::commit()).await.map(drop)
    }

    pub async fn cancel(&mut self) -> Result<()> {
        self.send(&Request::cancel()).await.map(drop)
    }

    pub async fn save(&mut self) -> Result<()> {
        self.send(&Request::save()).await.map(drop)
    }

    /// Serialized configuration below `path`.
    pub async fn dump(&mut self, path: &str) -> Result<String> {
        let answer = self.send(&Request::dump(path)?).await?;
        answer.require_body()?.expect(avp::STRING)?.as_string()
    }

    /// Names of the values the enumeration parameter at `path` accepts.
    pub async fn retrieve_enums(&mut self, path: &str) -> Result<Vec<String>> {
        let answer = self.send(&Request::retrieve_enums(path)?).await?;
        let mut body = answer.body();
        let mut names = Vec::new();
        while let Some(attr) = body.next_avp()? {
            names.push(attr.as_string()?);
        }
        Ok(names)
    }

    // Notifications

    /// Subscribe to active notifications delivered to `callback`.
    pub async fn subscribe_notify<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut(Feedback) + Send + 'static,
    {
        self.send_with_feedback(Feature::ActiveNotify, Request::subscribe_notify(), callback)
            .await
    }

    /// Subscribe to gateway notifications; they share the active-notify slot.
    pub async fn subscribe_gw_notify<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut(Feedback) + Send + 'static,
    {
        self.send_with_feedback(Feature::ActiveNotify, Request::subscribe_gw_notify(), callback)
            .await
    }

    pub async fn unsubscribe_notify(&mut self) -> Result<()> {
        self.send(&Request::unsubscribe_notify()).await.map(drop)
    }

    pub async fn unsubscribe_gw_notify(&mut self) -> Result<()> {
        self.send(&Request::unsubscribe_gw_notify()).await.map(drop)
    }

    pub async fn param_notify(&mut self, enabled: bool, paths: &[&str]) -> Result<()> {
        self.send(&Request::param_notify(enabled, paths)?)
            .await
            .map(drop)
    }

    pub async fn recursive_param_notify(&mut self, enabled: bool, path: &str) -> Result<()> {
        self.send(&Request::recursive_param_notify(enabled, path)?)
            .await
            .map(drop)
    }

    /// Queued passive notifications; decode with
    /// [`decode_notifications`](crate::decode::decode_notifications).
    pub async fn get_passive_notifications(&mut self) -> Result<AvpCursor> {
        let answer = self.send(&Request::get_passive_notifications()).await?;
        Ok(answer.body())
    }

    // Gateway

    pub async fn gw_get_client(&mut self, zone: u16, nat: bool, addr: IpAddr, port: u16) -> Result<AvpCursor> {
        let answer = self.send(&Request::gw_get_client(zone, nat, addr, port)?).await?;
        answer.require_body()
    }

    pub async fn gw_get_all_clients(&mut self, zone: u16) -> Result<AvpCursor> {
        let answer = self.send(&Request::gw_get_all_clients(zone)?).await?;
        Ok(answer.body())
    }

    pub async fn gw_req_client_accessclass(&mut self, request: &AccessClassRequest) -> Result<AccessClassReply> {
        let answer = self
            .send(&Request::gw_req_client_accessclass(request)?)
            .await?;
        AccessClassReply::decode(answer.require_body()?)
    }

    pub async fn gw_set_client_accessclass(
        &mut self,
        path: &str,
        username: Option<&str>,
        access_class: &str,
    ) -> Result<()> {
        self.send(&Request::gw_set_client_accessclass(path, username, access_class)?)
            .await
            .map(drop)
    }

    pub async fn gw_sol_inform(&mut self, zone: u16, access_class: u16, addr: IpAddr, mac: &str) -> Result<()> {
        self.send(&Request::gw_sol_inform(zone, access_class, addr, mac)?)
            .await
            .map(drop)
    }

    // Device

    pub async fn hotplug(&mut self, cmd: &str) -> Result<()> {
        self.send(&Request::hotplug(cmd)?).await.map(drop)
    }

    pub async fn conf_save(&mut self, server: &str) -> Result<()> {
        self.send(&Request::conf_save(server)?).await.map(drop)
    }

    pub async fn conf_restore(&mut self, server: &str) -> Result<()> {
        self.send(&Request::conf_restore(server)?).await.map(drop)
    }

    /// Start a firmware update; progress and completion go to `callback`.
    pub async fn fwupdate<F>(&mut self, file: &str, device: &str, flags: u32, callback: F) -> Result<()>
    where
        F: FnMut(Feedback) + Send + 'static,
    {
        let request = Request::fwupdate(file, device, flags)?;
        self.send_with_feedback(Feature::FirmwareUpdate, request, callback)
            .await
    }

    /// Start a ping run; samples and the summary go to `callback`.
    pub async fn ping<F>(&mut self, host: &str, count: u32, timeout: u32, callback: F) -> Result<()>
    where
        F: FnMut(Feedback) + Send + 'static,
    {
        let request = Request::ping(host, count, timeout)?;
        self.send_with_feedback(Feature::Ping, request, callback).await
    }

    pub async fn traceroute<F>(
        &mut self,
        host: &str,
        tries: u8,
        timeout: u32,
        size: u16,
        max_hop: u8,
        callback: F,
    ) -> Result<()>
    where
        F: FnMut(Feedback) + Send + 'static,
    {
        let request = Request::traceroute(host, tries, timeout, size, max_hop)?;
        self.send_with_feedback(Feature::Traceroute, request, callback)
            .await
    }

    pub async fn pcap<F>(
        &mut self,
        interface: &str,
        url: &str,
        timeout: u32,
        packets: u16,
        kbytes: u16,
        callback: F,
    ) -> Result<()>
    where
        F: FnMut(Feedback) + Send + 'static,
    {
        let request = Request::pcap(interface, url, timeout, packets, kbytes)?;
        self.send_with_feedback(Feature::Pcap, request, callback)
            .await
    }
}

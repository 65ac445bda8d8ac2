use std::collections::VecDeque;

use crate::chi::flit::{Flit, Phase};
use crate::chi::opcodes::Channel;
use crate::error::PortError;

/// Link layer of one CHI channel: an RX queue fed by the peer, a TX queue
/// drained toward the peer, and credit counters for both directions.
///
/// Credits we issue bound what the peer may send us; credits the peer issues
/// bound what we may send back. Credit-return flits ride the same wire but
/// carry only the `lcrd` bit and do not themselves consume a credit.
#[derive(Debug)]
pub struct LinkChannel {
    channel: Channel,
    active: bool,
    pub rx_queue: VecDeque<Flit>,
    pub tx_queue: VecDeque<Flit>,
    /// Credits granted to us by the peer, spent one per TX flit.
    tx_credits: u32,
    /// Credits we have issued that the peer has not yet spent.
    issued: u32,
    /// Credits issued this cycle, to be put on the wire at the falling edge.
    credits_to_send: u32,
    max_credits: u32,
}

impl LinkChannel {
    pub fn new(channel: Channel, active: bool, max_credits: u32) -> Self {
        Self {
            channel,
            active,
            rx_queue: VecDeque::new(),
            tx_queue: VecDeque::new(),
            tx_credits: 0,
            issued: 0,
            credits_to_send: 0,
            max_credits,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Peer-facing delivery. A flit on an inactive channel is a protocol
    /// violation; a real flit spends one of the credits we issued.
    pub fn receive_flit(&mut self, flit: Flit) -> Result<(), PortError> {
        if !self.active {
            return Err(PortError::InactiveChannel(self.channel));
        }
        if flit.phase.lcrd {
            self.tx_credits += 1;
            return Ok(());
        }
        if self.issued == 0 {
            return Err(PortError::CreditUnderflow(self.channel));
        }
        self.issued -= 1;
        self.rx_queue.push_back(flit);
        Ok(())
    }

    /// Rising-edge credit replenish: promise the peer every slot not already
    /// covered by an outstanding credit or an undrained RX entry. Returns the
    /// number of newly issued credits.
    pub fn rx_credits_update(&mut self) -> u32 {
        if !self.active {
            return 0;
        }
        let covered = self.issued + self.rx_queue.len() as u32;
        let newly = self.max_credits.saturating_sub(covered);
        self.issued += newly;
        self.credits_to_send += newly;
        newly
    }

    /// Credits the peer could still spend on this channel. The admission
    /// pipeline uses `max - rx_credits_available` as the count of requests
    /// potentially already in flight toward the port.
    pub fn rx_credits_available(&self) -> u32 {
        self.max_credits - self.issued - self.rx_queue.len() as u32
    }

    pub fn max_credits(&self) -> u32 {
        self.max_credits
    }

    /// Falling-edge transmit: first return freshly issued credits, then send
    /// queued flits while peer credit lasts.
    pub fn send_flits<F: FnMut(Flit)>(&mut self, mut send: F) {
        if !self.active {
            return;
        }
        for _ in 0..self.credits_to_send {
            let phase = Phase {
                channel: self.channel,
                lcrd: true,
                ..Phase::default()
            };
            send(Flit::rsp(phase));
        }
        self.credits_to_send = 0;
        while self.tx_credits > 0 {
            match self.tx_queue.pop_front() {
                Some(flit) => {
                    self.tx_credits -= 1;
                    send(flit);
                }
                None => break,
            }
        }
    }

    /// Test and harness hook standing in for credit-return flits from the
    /// peer's RX side.
    pub fn grant_tx_credits(&mut self, n: u32) {
        self.tx_credits += n;
    }
}
